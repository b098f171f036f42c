//! Errors reported by metadata providers and entity stores.

/// Failure of a single store or metadata call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("unknown entity type `{0}`")]
    UnknownEntity(String),

    #[error("record `{id}` not found in `{entity}`")]
    NotFound { entity: String, id: String },

    #[error("record is missing attribute `{attribute}`")]
    MissingAttribute { attribute: String },

    #[error("unknown relationship `{0}`")]
    UnknownRelationship(String),

    #[error("`{host_id}` is already linked to `{related_id}` through `{relationship}`")]
    AlreadyLinked {
        relationship: String,
        host_id: String,
        related_id: String,
    },

    #[error("`{host_id}` is not linked to `{related_id}` through `{relationship}`")]
    NotLinked {
        relationship: String,
        host_id: String,
        related_id: String,
    },

    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),
}
