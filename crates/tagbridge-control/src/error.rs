//! Control errors.

use crate::events::ControlState;
use tagbridge_model::StoreError;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ControlError {
    /// The host cannot describe an entity type. Fatal to initialization.
    #[error("metadata for `{entity_type}` unavailable: {source}")]
    MetadataUnavailable {
        entity_type: String,
        source: StoreError,
    },

    #[error("query against `{entity}` failed: {source}")]
    QueryFailure { entity: String, source: StoreError },

    #[error("linking `{key}` failed: {source}")]
    LinkFailure { key: String, source: StoreError },

    #[error("unlinking `{key}` failed: {source}")]
    UnlinkFailure { key: String, source: StoreError },

    #[error("control is {state}, not ready")]
    NotReady { state: ControlState },

    #[error("control has been disposed")]
    Disposed,
}

/// Failure to decode an encoded output value.
#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("value does not start with the `{0}` marker")]
    MissingPrefix(&'static str),

    #[error("malformed tag data: {0}")]
    Malformed(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value `{value}` for option `{option}`")]
    Invalid { option: String, value: String },
}

impl ConfigError {
    pub(crate) fn invalid(option: &str, value: &str) -> Self {
        ConfigError::Invalid {
            option: option.to_string(),
            value: value.to_string(),
        }
    }
}
