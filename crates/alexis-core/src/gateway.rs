//! Gateway trait and outbound message types.
//!
//! The [`Gateway`] is the black box that owns the connection to the chat
//! platform. The engine never talks to it directly from handlers: every
//! send goes through the framework's `Messenger`, which wraps a
//! [`BoxedGateway`] and adds the pre-send hooks and logging.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::GatewayResult;
use crate::event::Member;

/// A rich embed attached to an outbound message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Embed {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// 24-bit RGB colour; `0` is the platform default.
    #[serde(default)]
    pub colour: u32,
}

impl Embed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn image(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn colour(mut self, colour: u32) -> Self {
        self.colour = colour;
        self
    }
}

/// A message about to be sent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    /// Destination channel.
    pub channel_id: String,
    /// Text content.
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub embed: Option<Embed>,
}

impl OutboundMessage {
    /// A plain text message.
    pub fn text(channel_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            content: Some(content.into()),
            embed: None,
        }
    }

    /// An embed-only message.
    pub fn embed(channel_id: impl Into<String>, embed: Embed) -> Self {
        Self {
            channel_id: channel_id.into(),
            content: None,
            embed: Some(embed),
        }
    }

    /// Attaches an embed (builder pattern).
    pub fn with_embed(mut self, embed: Embed) -> Self {
        self.embed = Some(embed);
        self
    }
}

/// Handle to a message the gateway accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentMessage {
    pub id: String,
    pub channel_id: String,
}

/// The messaging gateway.
///
/// Implementations own the platform connection. All operations are opaque
/// async calls from the engine's point of view.
#[async_trait]
pub trait Gateway: Send + Sync + 'static {
    /// The bot account's own user id.
    fn self_id(&self) -> &str;

    /// Sends a message and returns its handle.
    async fn send(&self, message: OutboundMessage) -> GatewayResult<SentMessage>;

    /// Deletes a message.
    async fn delete(&self, channel_id: &str, message_id: &str) -> GatewayResult<()>;

    /// Starts (or refreshes) the typing indicator in a channel.
    async fn start_typing(&self, channel_id: &str) -> GatewayResult<()>;

    /// Clears the typing indicator in a channel.
    ///
    /// Platforms whose indicator expires on its own may keep the default.
    async fn stop_typing(&self, _channel_id: &str) -> GatewayResult<()> {
        Ok(())
    }

    /// Looks up a member of a server.
    async fn member(&self, server_id: &str, user_id: &str) -> GatewayResult<Option<Member>>;

    /// Changes the bot's presence text.
    async fn set_presence(&self, status: &str) -> GatewayResult<()>;
}

/// A shared gateway trait object.
pub type BoxedGateway = Arc<dyn Gateway>;
