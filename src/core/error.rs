use crate::core::firewall::Mode;
use thiserror::Error;

/// Core error types for the firewall controller
#[derive(Debug, Error)]
pub enum Error {
    /// Rule lists cannot be edited while traffic is passed through unfiltered
    #[error("Can't edit rules while in {mode} mode")]
    InvalidModeOperation { mode: Mode },

    /// Remove/edit index is outside the active rule list
    #[error("Rule {index} not found in rules list (length {len})")]
    RuleNotFound { index: usize, len: usize },

    /// Configuration could not be written; the mutation was not committed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Persisted configuration exists but cannot be trusted
    #[error("Configuration corrupted: {0}")]
    Corrupted(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Input validation failed
    #[error("Validation error in {field}: {message}")]
    Validation { field: String, message: String },
}

impl Error {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Returns true for errors caused by the caller's request rather than
    /// by a failing collaborator.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidModeOperation { .. } | Error::RuleNotFound { .. } | Error::Validation { .. }
        )
    }
}

/// Errors reported by the managed switch gateway.
///
/// These never fail a controller operation; invalidation logs them and moves on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeviceError {
    #[error("Device {0} is not connected")]
    NotFound(String),

    #[error("Device unreachable: {0}")]
    Unreachable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
