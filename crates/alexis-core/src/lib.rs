//! # Alexis Core
//!
//! The event model and collaborator contracts of the Alexis chat bot.
//!
//! This crate holds everything the dispatch engine needs to know about the
//! outside world, and nothing about how events are routed:
//!
//! - **Events**: the typed [`Event`] enum delivered by the gateway, with the
//!   [`User`], [`Member`], [`Channel`] and [`Message`] payloads
//! - **Gateway**: the [`Gateway`] trait for outbound operations (send,
//!   delete, typing, member lookup, presence)
//! - **Storage**: the [`RecordStore`] used by plugins and the [`ServerConfig`]
//!   read by the engine
//!
//! ```text
//! ┌───────────┐  Event   ┌──────────────────┐  OutboundMessage  ┌───────────┐
//! │  Gateway  │─────────▶│ alexis-framework │──────────────────▶│  Gateway  │
//! └───────────┘          └──────────────────┘                   └───────────┘
//!                             │        ▲
//!                    ServerConfig    RecordStore (plugins)
//! ```

pub mod error;
pub mod event;
pub mod gateway;
pub mod store;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{GatewayError, GatewayResult, StoreError, StoreResult};
pub use event::{Attachment, Channel, Event, Member, Message, Role, User};
pub use gateway::{BoxedGateway, Embed, Gateway, OutboundMessage, SentMessage};
pub use store::{
    BoxedServerConfig, BoxedStore, MemoryStore, RecordServerConfig, RecordStore, ServerConfig,
};
