//! On-disk shape of a store: entity tables plus relationship definitions.
//!
//! ```json
//! {
//!   "entities": {
//!     "new_tag": {
//!       "metadata": { "idAttribute": "new_tagid", "nameAttribute": "new_name", "collectionName": "new_tags" },
//!       "records": [ { "new_tagid": "…", "new_name": "blue" } ]
//!     }
//!   },
//!   "relationships": {
//!     "new_account_new_tag": {
//!       "junctionEntity": "new_account_new_tag",
//!       "hostEntity": "account",
//!       "relatedEntity": "new_tag"
//!     }
//!   }
//! }
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tagbridge_model::{EntityMetadata, Record};

/// Records of one entity type together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTable {
    pub metadata: EntityMetadata,
    #[serde(default)]
    pub records: Vec<Record>,
}

/// A named many-to-many relationship between a host and a related entity.
///
/// Junction rows carry the host id under the host entity's id attribute and
/// the related id under the related entity's id attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDef {
    pub junction_entity: String,
    pub host_entity: String,
    pub related_entity: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreFixture {
    #[serde(default)]
    pub entities: BTreeMap<String, EntityTable>,
    #[serde(default)]
    pub relationships: BTreeMap<String, RelationshipDef>,
}

impl StoreFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(
        mut self,
        entity_type: impl Into<String>,
        metadata: EntityMetadata,
        records: Vec<Record>,
    ) -> Self {
        self.entities
            .insert(entity_type.into(), EntityTable { metadata, records });
        self
    }

    pub fn with_relationship(
        mut self,
        relationship_name: impl Into<String>,
        def: RelationshipDef,
    ) -> Self {
        self.relationships.insert(relationship_name.into(), def);
        self
    }

    /// Find the entity type whose metadata names `collection`.
    pub fn entity_for_collection(&self, collection: &str) -> Option<(&str, &EntityTable)> {
        self.entities
            .iter()
            .find(|(_, table)| table.metadata.collection_name == collection)
            .map(|(name, table)| (name.as_str(), table))
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read store fixture {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse store fixture {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write store fixture {}", path.display()))
    }
}
