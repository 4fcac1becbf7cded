//! Configuration for the Alexis runtime.
//!
//! Layered loading through figment, a serde schema with defaults for every
//! field, and explicit validation before the runtime starts.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    AlexisConfig, BotConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig,
    RuntimeConfig, SpanEventConfig,
};
pub use validation::validate_config;
