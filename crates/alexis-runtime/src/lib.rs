//! Alexis Runtime - Orchestration layer for the Alexis chat bot.
//!
//! This crate provides:
//! - Layered configuration (`config`): defaults, TOML files, `ALEXIS_*`
//!   environment variables
//! - Logging setup driven by that configuration (`logging`)
//! - The event loop (`BotRuntime`): one task per event, scheduled handler
//!   ticks, graceful shutdown
//!
//! ```ignore
//! use alexis_runtime::BotRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = BotRuntime::builder()
//!         .gateway(gateway)
//!         .handler(ping)
//!         .build()?;
//!
//!     let (events_tx, events) = runtime.event_channel();
//!     connect(events_tx);
//!
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod logging;
pub mod runtime;

// Re-exports
pub use config::{AlexisConfig, BotConfig, ConfigError, ConfigLoader, ConfigResult};
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use runtime::{BotRuntime, RuntimeBuilder, RuntimeStats};

// Re-export tracing for use by other crates
pub use tracing;
pub use tracing_subscriber;

/// Logging macros for handler code.
pub mod prelude {
    pub use tracing::{Level, debug, error, info, instrument, span, trace, warn};
}
