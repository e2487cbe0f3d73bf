//! Error types for the ledger.

use crate::core::types::Tier;
use thiserror::Error;

/// Result type alias for ledger operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in ledger operations.
///
/// Integrity failures are not errors: they are reported through
/// [`ChainValidation`](crate::ledger::ChainValidation) values.
#[derive(Error, Debug)]
pub enum Error {
    // Lookup errors
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    // Lifecycle errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Invalid attendance status: {0}")]
    InvalidAttendanceStatus(String),

    // Mining errors
    #[error("Mining cancelled before a valid nonce was found")]
    MiningCancelled,

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Shorthand for a missing entity of the given tier.
    pub fn not_found(tier: Tier, id: impl ToString) -> Self {
        Error::NotFound {
            what: tier.label(),
            id: id.to_string(),
        }
    }

    /// Shorthand for an id that matches no chain in any tier.
    pub fn unknown_entity(id: impl ToString) -> Self {
        Error::NotFound {
            what: "Entity",
            id: id.to_string(),
        }
    }

    /// Whether this error means the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::SerializationError(err.to_string())
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(err: tokio::task::JoinError) -> Self {
        Error::Internal(err.to_string())
    }
}
