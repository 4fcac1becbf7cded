//! Error types for the Alexis engine.

use thiserror::Error;

/// Errors raised while loading handlers into the registry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// A handler name, command name or alias is already taken.
    #[error("name '{name}' of handler '{handler}' is already used by handler '{existing}'")]
    DuplicateName {
        /// The colliding name or alias.
        name: String,
        /// The handler being registered.
        handler: String,
        /// The handler that already owns the name.
        existing: String,
    },

    /// The handler declares no name.
    #[error("handler has an empty name")]
    EmptyName,

    /// The handler declares a prefix trigger with an empty prefix.
    #[error("handler '{0}' declares an empty prefix")]
    EmptyPrefix(String),
}

/// Result type for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Result type returned by handler bodies.
///
/// Handler logic is third-party code, so any error type is accepted and the
/// dispatcher only reports it.
pub type HandlerResult = anyhow::Result<()>;
