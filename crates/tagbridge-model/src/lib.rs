//! Tagbridge model: the vocabulary shared by the tag control and its hosts.
//!
//! A tag control attaches "tag" records to a host record through a
//! many-to-many relationship held by a remote entity store:
//!
//! ```text
//!   host record ──┐                      ┌── related (tag) record
//!   (account)     │   junction record    │   (new_tag)
//!                 └──► accountid  ◄──────┤
//!                      new_tagid  ───────┘
//! ```
//!
//! This crate defines:
//! - value types (`Tag`, `EntityMetadata`, `RelationshipDescriptor`, `HostContext`)
//! - the textual query grammar the store understands (`query`)
//! - the contract a host implements to serve the control (`store`)

pub mod error;
pub mod query;
pub mod store;

pub use error::StoreError;
pub use query::{FilterExpr, Literal, OrderBy, QueryParseError, RecordQuery, SortDirection};
pub use store::{EntityStore, MetadataProvider};

use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};
use uuid::Uuid;

/// Placeholder id a host reports for a record that has not been saved yet.
pub const NIL_ID: &str = "00000000-0000-0000-0000-000000000000";

/// A raw record as returned by the entity store (attribute name → value).
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Read an attribute as a string, accepting string, number and bool values.
pub fn record_str(record: &Record, attribute: &str) -> Option<String> {
    match record.get(attribute)? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

// ============================================================================
// Tags
// ============================================================================

/// A selectable item representing one related-entity record.
///
/// Equality and hashing consider the `key` only: two tags with the same key
/// are the same tag even if their labels differ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub name: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
        }
    }

    /// Build a tag from a related-entity record using the resolved attribute names.
    pub fn from_record(record: &Record, metadata: &EntityMetadata) -> Result<Self, StoreError> {
        let key = record_str(record, &metadata.id_attribute).ok_or_else(|| {
            StoreError::MissingAttribute {
                attribute: metadata.id_attribute.clone(),
            }
        })?;
        let name = record_str(record, &metadata.name_attribute).ok_or_else(|| {
            StoreError::MissingAttribute {
                attribute: metadata.name_attribute.clone(),
            }
        })?;
        Ok(Self { key, name })
    }
}

impl PartialEq for Tag {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Tag {}

impl Hash for Tag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

// ============================================================================
// Metadata & Relationship Identity
// ============================================================================

/// What the host knows about one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityMetadata {
    /// Primary id attribute (e.g. `new_tagid`)
    pub id_attribute: String,
    /// Primary display-name attribute (e.g. `new_name`)
    pub name_attribute: String,
    /// Name of the backing collection (e.g. `new_tags`)
    pub collection_name: String,
}

impl EntityMetadata {
    pub fn new(
        id_attribute: impl Into<String>,
        name_attribute: impl Into<String>,
        collection_name: impl Into<String>,
    ) -> Self {
        Self {
            id_attribute: id_attribute.into(),
            name_attribute: name_attribute.into(),
            collection_name: collection_name.into(),
        }
    }

    /// The `[id, name]` select list used whenever tags are read.
    pub fn tag_fields(&self) -> Vec<String> {
        vec![self.id_attribute.clone(), self.name_attribute.clone()]
    }
}

/// Which relationship a control edits. Constant for the control's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelationshipDescriptor {
    pub related_entity_type: String,
    pub junction_entity_type: String,
    pub relationship_name: String,
}

/// Identity of the record the control is bound to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostContext {
    pub entity_id: Option<String>,
    pub entity_type: String,
}

impl HostContext {
    pub fn new(entity_type: impl Into<String>, entity_id: impl Into<String>) -> Self {
        Self {
            entity_id: Some(entity_id.into()),
            entity_type: entity_type.into(),
        }
    }

    /// A record of `entity_type` that has not been saved yet.
    pub fn unsaved(entity_type: impl Into<String>) -> Self {
        Self {
            entity_id: None,
            entity_type: entity_type.into(),
        }
    }

    /// The record id, or `None` when the record does not exist remotely yet.
    ///
    /// Absent ids, empty ids and the nil GUID (in any textual form `uuid`
    /// accepts, braces included) all mean "not yet persisted".
    pub fn persisted_id(&self) -> Option<&str> {
        let id = self.entity_id.as_deref()?.trim();
        if id.is_empty() || is_nil_id(id) {
            return None;
        }
        Some(id)
    }

    pub fn exists(&self) -> bool {
        self.persisted_id().is_some()
    }
}

/// `true` when `id` is the nil GUID.
pub fn is_nil_id(id: &str) -> bool {
    Uuid::parse_str(id.trim()).map(|u| u.is_nil()).unwrap_or(false)
}

// ============================================================================
// Associations
// ============================================================================

/// A record addressed by collection name and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordRef {
    pub collection: String,
    pub id: String,
}

impl RecordRef {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// One link (or unlink) request between the host record and a related record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Association {
    pub relationship_name: String,
    pub host: RecordRef,
    pub related: RecordRef,
}

/// `(relationship, host id, tag key)`: at most one operation per key is in
/// flight within a reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssociationKey {
    pub relationship_name: String,
    pub host_id: String,
    pub tag_key: String,
}

impl Association {
    pub fn key(&self) -> AssociationKey {
        AssociationKey {
            relationship_name: self.relationship_name.clone(),
            host_id: self.host.id.clone(),
            tag_key: self.related.id.clone(),
        }
    }
}
