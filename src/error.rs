//! Error taxonomy shared by the three adapters.
//!
//! Each variant carries a message that is safe to hand back to the caller
//! as-is. The HTTP chat server maps `InvalidInput` to 400 and everything
//! else to 500; the MCP tool maps `InvalidInput` to an invalid-params
//! error; the ingestion trigger folds every variant into a 500 body.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HrKbError {
    /// A required identifier is missing or a setting is unusable.
    #[error("{0}")]
    Config(String),

    /// The request shape is wrong. Never reaches the remote service.
    #[error("{0}")]
    InvalidInput(String),

    /// The knowledge service call failed (network, auth, or API error).
    #[error("{0}")]
    Remote(String),
}

impl HrKbError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, HrKbError::InvalidInput(_))
    }
}

/// Result alias used across the adapters.
pub type HrKbResult<T> = Result<T, HrKbError>;
