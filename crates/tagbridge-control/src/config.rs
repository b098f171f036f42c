//! Control configuration as supplied by the host.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tagbridge_model::RelationshipDescriptor;

/// How `TagControl::get_outputs` encodes the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutputFormat {
    /// `TAGDATA:` followed by a JSON body naming the relationship
    #[default]
    Tagged,
    /// Selected keys joined by commas
    KeyList,
}

/// Options a host configures on the control.
///
/// Field names follow the host's camelCase parameter names. Missing options
/// default to empty strings, the way hosts report unset parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ControlConfig {
    /// Entity type of the tags (e.g. `new_tag`)
    pub related_entity: String,
    /// Junction entity type holding the links (e.g. `new_account_new_tag`)
    pub relationship_entity: String,
    /// Relationship schema name used for link/unlink
    pub relationship_name: String,
    pub output_format: OutputFormat,
    /// Cap on the number of suggestions returned
    pub max_suggestions: Option<usize>,
    /// Drop tags the picker already shows from suggestion lists
    pub hide_selected_suggestions: bool,
}

impl ControlConfig {
    pub fn new(
        related_entity: impl Into<String>,
        relationship_entity: impl Into<String>,
        relationship_name: impl Into<String>,
    ) -> Self {
        Self {
            related_entity: related_entity.into(),
            relationship_entity: relationship_entity.into(),
            relationship_name: relationship_name.into(),
            ..Default::default()
        }
    }

    /// Build from a raw host parameter bag. Unknown keys are ignored.
    pub fn from_parameters(parameters: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let get = |name: &str| parameters.get(name).cloned().unwrap_or_default();
        let mut config = Self::new(
            get("relatedEntity"),
            get("relationshipEntity"),
            get("relationshipName"),
        );

        if let Some(value) = parameters.get("outputFormat") {
            config.output_format = match value.as_str() {
                "tagged" => OutputFormat::Tagged,
                "keyList" => OutputFormat::KeyList,
                _ => return Err(ConfigError::invalid("outputFormat", value)),
            };
        }
        if let Some(value) = parameters.get("maxSuggestions") {
            let max = value
                .parse::<usize>()
                .map_err(|_| ConfigError::invalid("maxSuggestions", value))?;
            config.max_suggestions = Some(max);
        }
        if let Some(value) = parameters.get("hideSelectedSuggestions") {
            config.hide_selected_suggestions = value
                .parse::<bool>()
                .map_err(|_| ConfigError::invalid("hideSelectedSuggestions", value))?;
        }
        Ok(config)
    }

    pub fn descriptor(&self) -> RelationshipDescriptor {
        RelationshipDescriptor {
            related_entity_type: self.related_entity.clone(),
            junction_entity_type: self.relationship_entity.clone(),
            relationship_name: self.relationship_name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_missing_parameters_default_to_empty() {
        let config = ControlConfig::from_parameters(&params(&[("relatedEntity", "new_tag")])).unwrap();
        assert_eq!(config.related_entity, "new_tag");
        assert_eq!(config.relationship_entity, "");
        assert_eq!(config.output_format, OutputFormat::Tagged);
    }

    #[test]
    fn test_optional_parameters() {
        let config = ControlConfig::from_parameters(&params(&[
            ("outputFormat", "keyList"),
            ("maxSuggestions", "10"),
            ("hideSelectedSuggestions", "true"),
        ]))
        .unwrap();
        assert_eq!(config.output_format, OutputFormat::KeyList);
        assert_eq!(config.max_suggestions, Some(10));
        assert!(config.hide_selected_suggestions);
    }

    #[test]
    fn test_rejects_bad_values() {
        let err = ControlConfig::from_parameters(&params(&[("maxSuggestions", "lots")])).unwrap_err();
        assert!(err.to_string().contains("maxSuggestions"), "err={err}");
    }

    #[test]
    fn test_deserializes_camel_case() {
        let config: ControlConfig = serde_json::from_str(
            r#"{"relatedEntity":"new_tag","relationshipEntity":"j","relationshipName":"r","outputFormat":"keyList"}"#,
        )
        .unwrap();
        assert_eq!(config.descriptor().junction_entity_type, "j");
        assert_eq!(config.output_format, OutputFormat::KeyList);
    }
}
