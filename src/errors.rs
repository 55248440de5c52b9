/*!
 * Error types for the gridsync library.
 *
 * Each layer has its own error enum (wire, mapping, local store, sync,
 * configuration) defined with thiserror. Every error maps onto a stable
 * `ReasonCode` that ends up in reports and in the CLI's JSON output.
 */

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::sync::SyncState;

/// Stable, machine-readable failure taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    /// Network or server-side failure, retryable
    Transport,
    /// Credentials were refused, never retried
    Auth,
    /// The service throttled the client
    RateLimit,
    /// A record or entry could not be mapped
    Mapping,
    /// Local and remote both changed since the last sync
    Conflict,
    /// The service did not acknowledge a submitted record
    Rejected,
    /// Non-retryable error answered by the service
    Api,
    /// The service answered with a body that could not be decoded
    Protocol,
    /// Invalid options or identifiers
    Config,
    /// Reading or writing the local text source failed
    LocalStore,
    /// The session was cancelled before doing any work
    Cancelled,
    /// The hosting service is stopped
    ServiceStopped,
}

impl ReasonCode {
    // @returns: snake_case identifier used in reports
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Auth => "auth",
            Self::RateLimit => "rate_limit",
            Self::Mapping => "mapping",
            Self::Conflict => "conflict",
            Self::Rejected => "rejected",
            Self::Api => "api",
            Self::Protocol => "protocol",
            Self::Config => "config",
            Self::LocalStore => "local_store",
            Self::Cancelled => "cancelled",
            Self::ServiceStopped => "service_stopped",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur when talking to the grid service
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireError {
    /// The request was rejected before any I/O
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Network failure or 5xx answer
    #[error("Transport error: {0}")]
    Transport(String),

    /// 401 or 403 answer
    #[error("Authentication error: {0}")]
    Auth(String),

    /// 429 answer
    #[error("Rate limit exceeded: {message}")]
    RateLimited {
        /// Body returned with the 429
        message: String,
        /// Seconds from the Retry-After header, when present
        retry_after_secs: Option<u64>,
    },

    /// Any other non-success answer
    #[error("API responded with error: {status_code} - {message}")]
    Api {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// The response body could not be decoded
    #[error("Failed to parse API response: {0}")]
    Parse(String),
}

impl WireError {
    /// Whether the HTTP client should try the request again
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::RateLimited { .. })
    }

    /// Delay requested by the service before the next attempt
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after_secs: Some(secs), .. } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }

    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::InvalidRequest(_) => ReasonCode::Config,
            Self::Transport(_) => ReasonCode::Transport,
            Self::Auth(_) => ReasonCode::Auth,
            Self::RateLimited { .. } => ReasonCode::RateLimit,
            Self::Api { .. } => ReasonCode::Api,
            Self::Parse(_) => ReasonCode::Protocol,
        }
    }
}

/// Errors raised while converting between grid records and entries
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MappingError {
    /// A culture column names a culture that cannot be resolved
    #[error("Record '{record_id}': column '{column_id}' does not name a known culture ('{culture}')")]
    UnknownCulture {
        record_id: String,
        column_id: String,
        culture: String,
    },

    /// An entry culture has no grid column form
    #[error("Entry '{key}': culture '{culture}' cannot be expressed as a grid column")]
    UnmappableCulture { key: String, culture: String },

    /// A record has no usable id or an entry has no key
    #[error("Record or entry has an empty key")]
    EmptyKey,

    /// `to_record` was called with no entries
    #[error("Cannot build a record from an empty entry group")]
    EmptyGroup,

    /// `to_record` was called with entries from different keys
    #[error("Entry group mixes keys '{expected}' and '{found}'")]
    MixedKeys { expected: String, found: String },

    /// Two cells of one record resolve to the same culture
    #[error("Key '{key}' has more than one value for culture '{culture}'")]
    DuplicateCulture { key: String, culture: String },

    /// A record maps to a key another record of the same pull already holds
    #[error("Record '{record_id}' maps to key '{key}', which another record already holds")]
    DuplicateKey { record_id: String, key: String },

    /// A metadata column holds a value of the wrong shape
    #[error("Record '{record_id}': column '{column_id}' has an invalid value: {message}")]
    InvalidMetadata {
        record_id: String,
        column_id: String,
        message: String,
    },
}

impl MappingError {
    pub fn reason_code(&self) -> ReasonCode {
        ReasonCode::Mapping
    }

    /// Culture the error is about, when it names one
    pub fn culture(&self) -> Option<&str> {
        match self {
            Self::UnknownCulture { culture, .. }
            | Self::UnmappableCulture { culture, .. }
            | Self::DuplicateCulture { culture, .. } => Some(culture),
            _ => None,
        }
    }
}

/// Errors from the local text source
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Filesystem failure
    #[error("Local store I/O error: {0}")]
    Io(String),

    /// The stored snapshot could not be decoded or encoded
    #[error("Local store format error: {0}")]
    Format(String),

    /// A snapshot holds two entries for one key and culture
    #[error("Duplicate local entry for key '{key}' and culture '{culture}'")]
    DuplicateEntry { key: String, culture: String },
}

impl StoreError {
    pub fn reason_code(&self) -> ReasonCode {
        ReasonCode::LocalStore
    }
}

impl From<std::io::Error> for StoreError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(error: serde_json::Error) -> Self {
        Self::Format(error.to_string())
    }
}

/// Invalid options, detected when building settings
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required value is empty
    #[error("Missing required setting: {0}")]
    Missing(String),

    /// A value is present but out of range or malformed
    #[error("Invalid setting '{field}': {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn reason_code(&self) -> ReasonCode {
        ReasonCode::Config
    }
}

/// Errors that abort a sync session
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    /// Error from the grid service
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Error from the local text source
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error in the options
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// The session state machine refused a transition
    #[error("Invalid session transition from {from} to {to}")]
    InvalidTransition { from: SyncState, to: SyncState },

    /// Cancellation was requested before the session did any work
    #[error("Session cancelled")]
    Cancelled,

    /// The hosting service is not running
    #[error("Sync service is stopped")]
    ServiceStopped,
}

impl SyncError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::Wire(e) => e.reason_code(),
            Self::Store(e) => e.reason_code(),
            Self::Config(e) => e.reason_code(),
            Self::InvalidTransition { .. } => ReasonCode::Config,
            Self::Cancelled => ReasonCode::Cancelled,
            Self::ServiceStopped => ReasonCode::ServiceStopped,
        }
    }
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the grid service
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),

    /// Error from record mapping
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    /// Error from the local store
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Error from configuration
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// Error from a sync session
    #[error("Sync error: {0}")]
    Sync(#[from] SyncError),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl AppError {
    pub fn reason_code(&self) -> ReasonCode {
        match self {
            Self::File(_) => ReasonCode::LocalStore,
            Self::Wire(e) => e.reason_code(),
            Self::Mapping(e) => e.reason_code(),
            Self::Store(e) => e.reason_code(),
            Self::Config(e) => e.reason_code(),
            Self::Sync(e) => e.reason_code(),
            Self::Unknown(_) => ReasonCode::Config,
        }
    }
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
