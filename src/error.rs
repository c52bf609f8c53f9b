//! Error types for the guild entity cache

use std::num::ParseIntError;

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors that can occur while feeding or querying the cache
#[derive(Error, Debug)]
pub enum CacheError {
    /// An ID string handed to the query boundary is not a decimal u64
    #[error("Invalid snowflake '{value}': {source}")]
    InvalidSnowflake {
        value: String,
        #[source]
        source: ParseIntError,
    },

    // =========================================================================
    // Payload Errors
    // =========================================================================
    /// A payload fragment could not be decoded into an entity
    #[error("Failed to decode {entity}: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is missing from an event payload
    #[error("Missing field '{field}' in {event} payload")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    /// Channel payload carries a type the cache does not know how to store
    #[error("Unsupported channel type {0}")]
    UnsupportedChannelType(u64),

    // =========================================================================
    // Runtime Errors
    // =========================================================================
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// The offloaded guild snapshot load panicked or was cancelled
    #[error("Bulk load task failed: {0}")]
    BulkLoad(#[from] tokio::task::JoinError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error outside of entity decoding
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CacheError {
    /// Wrap a serde error raised while decoding `entity`
    pub fn decode(entity: &'static str, source: serde_json::Error) -> Self {
        Self::Decode { entity, source }
    }

    /// Build a missing-field error for `event`
    pub fn missing(event: &'static str, field: &'static str) -> Self {
        Self::MissingField { event, field }
    }
}

// =============================================================================
// Tests
// =============================================================================
