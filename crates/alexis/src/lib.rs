//! # Alexis
//!
//! A chat bot built around a typed event dispatch and command-routing
//! engine.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐  Event  ┌─────────────┐     ┌────────────┐     ┌──────────────────────┐
//! │  Gateway  │────────▶│ BotRuntime  │────▶│ Dispatcher │────▶│ Handler "set"        │
//! └───────────┘  mpsc   │ (task/event)│     │ gate       │────▶│ Handler "macro-use"  │
//!       ▲               └─────────────┘     │ cooldown   │────▶│ Handler ...          │
//!       │                                   └────────────┘     └──────────────────────┘
//!       └──────────────────── Messenger (pre-send hooks) ◀──────────────┘
//! ```
//!
//! - **Gateway** ([`core`]): the platform connection, a black box behind a trait
//! - **Dispatcher** ([`framework`]): routes each event to its candidate handlers
//! - **Runtime** ([`runtime`]): configuration, logging, event loop, shutdown
//! - **Plugins** ([`plugins`]): built-in handlers (status rotation, macros)
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use alexis::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = alexis::runtime::config::load_config()?;
//!     let registry = alexis::registry_with_builtins(&config.bot)?;
//!
//!     let runtime = BotRuntime::builder()
//!         .config(config)
//!         .registry(registry)
//!         .handler(Arc::new(handler_fn(HandlerSpec::command("ping"), |ctx| async move {
//!             ctx.answer("pong").await?;
//!             Ok(())
//!         })))
//!         .gateway(my_gateway())
//!         .build()?;
//!
//!     let (events_tx, events) = runtime.event_channel();
//!     spawn_connection(events_tx);
//!     runtime.run(events).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `toml-config`: TOML configuration files (default)
//! - `json-log`: `format = "json"` log output

pub use alexis_core as core;
pub use alexis_framework as framework;
pub use alexis_plugins as plugins;
pub use alexis_runtime as runtime;

use alexis_framework::{HandlerRegistry, RegistryResult};
use alexis_runtime::BotConfig;

/// A registry holding the built-in handlers, set up from the `[bot]` section.
pub fn registry_with_builtins(bot: &BotConfig) -> RegistryResult<HandlerRegistry> {
    let mut registry = HandlerRegistry::new();
    alexis_plugins::register_builtins(&mut registry, &bot.command_prefix, bot.status_interval())?;
    Ok(registry)
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use alexis::prelude::*;
/// ```
pub mod prelude {
    pub use std::sync::Arc;

    // Runtime - main entry point
    pub use alexis_runtime::{AlexisConfig, BotRuntime, RuntimeBuilder};

    // Handler contract
    pub use alexis_framework::{
        BoxedHandler, CommandContext, Handler, HandlerRegistry, HandlerResult, HandlerSpec,
        Messenger, handler_fn,
    };

    // Gateway contract and event model
    pub use alexis_core::{
        BoxedGateway, Embed, Event, Gateway, GatewayResult, Member, Message, OutboundMessage,
        SentMessage, User,
    };

    // Logging macros
    pub use alexis_runtime::prelude::*;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_follow_bot_config() {
        let bot = BotConfig {
            command_prefix: "?".to_string(),
            ..Default::default()
        };
        let registry = registry_with_builtins(&bot).unwrap();
        let macro_use = registry.prefix_handlers()[0].spec();
        assert_eq!(macro_use.matched_trigger("?hola", "?"), Some("?"));
        assert_eq!(macro_use.matched_trigger("? hola", "?"), Some("? "));
        assert_eq!(macro_use.matched_trigger("¡hola", "?"), Some("¡"));
    }
}
