//! Host-facing contract.
//!
//! The control never talks to a transport directly. A host serves it through
//! two traits: one that describes entity types, one that reads records and
//! creates or removes relationship links. Entity and attribute names are
//! opaque strings on both sides of this boundary.

use crate::{Association, EntityMetadata, Record, RecordQuery, StoreError};
use async_trait::async_trait;

/// Describes entity types (id attribute, name attribute, collection name).
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn describe(&self, entity_type: &str) -> Result<EntityMetadata, StoreError>;
}

/// Generic record access against named entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Fetch one record by id, projected onto `fields` (all fields when empty).
    async fn fetch_one(
        &self,
        entity: &str,
        id: &str,
        fields: &[String],
    ) -> Result<Record, StoreError>;

    /// Fetch every record of `entity` matching `query`.
    async fn fetch_many(&self, entity: &str, query: &RecordQuery)
        -> Result<Vec<Record>, StoreError>;

    /// Create the relationship link described by `association`.
    async fn link(&self, association: &Association) -> Result<(), StoreError>;

    /// Remove the relationship link described by `association`.
    async fn unlink(&self, association: &Association) -> Result<(), StoreError>;
}
