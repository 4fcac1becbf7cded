//! Runtime error types.

use alexis_framework::RegistryError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while building or running the runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A handler could not be registered.
    #[error("Failed to register handler: {0}")]
    Registry(#[from] RegistryError),

    /// The runtime was built without a gateway.
    #[error("No gateway configured")]
    MissingGateway,

    /// The logging subscriber could not be installed.
    #[error("Failed to initialize logging: {0}")]
    Logging(String),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
