//! Encoding the selection into the host's bound output value.
//!
//! The tagged form is the marker followed by a JSON body:
//!
//! ```text
//! TAGDATA:{"relatedEntity":"new_tag","relationshipName":"new_account_new_tag","tags":["…","…"]}
//! ```
//!
//! Downstream consumers (e.g. a save-time plugin that creates the links once
//! the record exists) recognise the marker and decode the body.

use crate::config::OutputFormat;
use crate::error::OutputError;
use crate::selection::SelectionState;
use serde::{Deserialize, Serialize};
use tagbridge_model::RelationshipDescriptor;

pub const TAG_DATA_PREFIX: &str = "TAGDATA:";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagData {
    pub related_entity: String,
    pub relationship_name: String,
    /// Selected keys, in selection order
    pub tags: Vec<String>,
}

impl TagData {
    pub fn new(descriptor: &RelationshipDescriptor, selection: &SelectionState) -> Self {
        Self {
            related_entity: descriptor.related_entity_type.clone(),
            relationship_name: descriptor.relationship_name.clone(),
            tags: selection.keys().map(str::to_string).collect(),
        }
    }

    pub fn encode(&self) -> Result<String, OutputError> {
        Ok(format!("{TAG_DATA_PREFIX}{}", serde_json::to_string(self)?))
    }

    pub fn parse(value: &str) -> Result<Self, OutputError> {
        let body = value
            .strip_prefix(TAG_DATA_PREFIX)
            .ok_or(OutputError::MissingPrefix(TAG_DATA_PREFIX))?;
        Ok(serde_json::from_str(body)?)
    }
}

/// `true` when `value` carries this control's tagged encoding.
pub fn is_tag_data(value: &str) -> bool {
    value.starts_with(TAG_DATA_PREFIX)
}

/// Pure: the same descriptor and selection always give the same string.
pub fn serialize(
    descriptor: &RelationshipDescriptor,
    selection: &SelectionState,
    format: OutputFormat,
) -> Result<String, OutputError> {
    match format {
        OutputFormat::Tagged => TagData::new(descriptor, selection).encode(),
        OutputFormat::KeyList => Ok(selection.keys().collect::<Vec<_>>().join(",")),
    }
}
