//! Error types shared by the Alexis collaborators.
//!
//! Engine-level errors (registry collisions, handler faults) live in
//! `alexis-framework`; the types here describe failures of the external
//! collaborators the engine talks to.

use thiserror::Error;

// =============================================================================
// Gateway Errors
// =============================================================================

/// Errors raised by the messaging gateway.
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// The gateway is not connected.
    #[error("gateway is not connected")]
    NotConnected,

    /// The platform refused the operation (missing permission).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The target channel, message or member does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The platform rejected the request as rate limited.
    #[error("rate limited by the platform, retry after {retry_after_ms} ms")]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after_ms: u64,
    },

    /// Message send failed for another reason.
    #[error("failed to send message: {0}")]
    SendFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

// =============================================================================
// Store Errors
// =============================================================================

/// Errors raised by a record store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// The backend could not be reached or failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Result type for record store operations.
pub type StoreResult<T> = Result<T, StoreError>;
