//! Outbound side of the engine.
//!
//! Every message the bot sends, from handlers, denial replies or scheduled
//! ticks, goes through [`Messenger`]. It runs the registered
//! [`PreSendHook`]s, logs the send and forwards to the gateway.

use std::collections::VecDeque;
use std::sync::Arc;

use alexis_core::{BoxedGateway, Embed, Gateway, GatewayResult, OutboundMessage, SentMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

/// How many bot-deleted message ids are remembered.
pub const DELETED_HISTORY: usize = 20;

/// Runs before every outbound message and may rewrite it.
#[async_trait]
pub trait PreSendHook: Send + Sync + 'static {
    async fn before_send(&self, message: &mut OutboundMessage);
}

/// A shared pre-send hook trait object.
pub type BoxedPreSendHook = Arc<dyn PreSendHook>;

/// Gateway wrapper used for all outbound traffic.
pub struct Messenger {
    gateway: BoxedGateway,
    hooks: Vec<BoxedPreSendHook>,
    deleted: Mutex<VecDeque<String>>,
}

impl Messenger {
    pub fn new(gateway: BoxedGateway) -> Self {
        Self {
            gateway,
            hooks: Vec::new(),
            deleted: Mutex::new(VecDeque::with_capacity(DELETED_HISTORY + 1)),
        }
    }

    /// Adds a pre-send hook. Hooks run in the order they were added.
    pub fn with_hook(mut self, hook: BoxedPreSendHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn gateway(&self) -> &BoxedGateway {
        &self.gateway
    }

    /// The bot's own user id.
    pub fn self_id(&self) -> &str {
        self.gateway.self_id()
    }

    /// Sends a message after running the pre-send hooks.
    pub async fn send(&self, mut message: OutboundMessage) -> GatewayResult<SentMessage> {
        for hook in &self.hooks {
            hook.before_send(&mut message).await;
        }

        info!(
            channel = %message.channel_id,
            content = message.content.as_deref().unwrap_or(""),
            embed = message.embed.is_some(),
            "Sending message"
        );

        self.gateway.send(message).await.inspect_err(|e| {
            warn!(error = %e, "Failed to send message");
        })
    }

    pub async fn send_text(
        &self,
        channel_id: &str,
        content: impl Into<String>,
    ) -> GatewayResult<SentMessage> {
        self.send(OutboundMessage::text(channel_id, content)).await
    }

    pub async fn send_embed(&self, channel_id: &str, embed: Embed) -> GatewayResult<SentMessage> {
        self.send(OutboundMessage::embed(channel_id, embed)).await
    }

    /// Deletes a message and remembers that the bot did it.
    ///
    /// If the gateway refuses, the id is forgotten again and the error is
    /// returned to the caller.
    pub async fn delete(&self, channel_id: &str, message_id: &str) -> GatewayResult<()> {
        self.remember_deleted(message_id);

        if let Err(e) = self.gateway.delete(channel_id, message_id).await {
            self.forget_deleted(message_id);
            warn!(
                channel = channel_id,
                message = message_id,
                error = %e,
                "Failed to delete message"
            );
            return Err(e);
        }
        self.trim_deleted();

        debug!(channel = channel_id, message = message_id, "Deleted message");
        Ok(())
    }

    /// Whether the message was deleted through this messenger recently.
    pub fn was_deleted_by_bot(&self, message_id: &str) -> bool {
        self.deleted.lock().iter().any(|id| id == message_id)
    }

    /// Updates the bot's presence line.
    pub async fn set_presence(&self, status: &str) -> GatewayResult<()> {
        debug!(status, "Changing presence");
        self.gateway.set_presence(status).await
    }

    fn remember_deleted(&self, message_id: &str) {
        self.deleted.lock().push_back(message_id.to_string());
    }

    /// Drops the oldest ids once a delete went through.
    fn trim_deleted(&self) {
        let mut deleted = self.deleted.lock();
        while deleted.len() > DELETED_HISTORY {
            deleted.pop_front();
        }
    }

    fn forget_deleted(&self, message_id: &str) {
        let mut deleted = self.deleted.lock();
        if let Some(pos) = deleted.iter().rposition(|id| id == message_id) {
            deleted.remove(pos);
        }
    }
}

impl std::fmt::Debug for Messenger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Messenger")
            .field("self_id", &self.gateway.self_id())
            .field("hook_count", &self.hooks.len())
            .field("deleted", &self.deleted.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alexis_core::testing::{GatewayCall, RecordingGateway};

    struct Shout;

    #[async_trait]
    impl PreSendHook for Shout {
        async fn before_send(&self, message: &mut OutboundMessage) {
            if let Some(content) = message.content.as_mut() {
                *content = content.to_uppercase();
            }
        }
    }

    #[tokio::test]
    async fn test_hooks_rewrite_outbound() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let messenger = Messenger::new(gateway.clone()).with_hook(Arc::new(Shout));

        let sent = messenger.send_text("c1", "hello").await.unwrap();
        assert_eq!(sent.channel_id, "c1");
        assert_eq!(gateway.sent_texts(), vec!["HELLO"]);
    }

    #[tokio::test]
    async fn test_delete_is_remembered() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let messenger = Messenger::new(gateway.clone());

        messenger.delete("c1", "m1").await.unwrap();
        assert!(messenger.was_deleted_by_bot("m1"));
        assert!(!messenger.was_deleted_by_bot("m2"));
        assert_eq!(
            gateway.calls(),
            vec![GatewayCall::Delete {
                channel_id: "c1".into(),
                message_id: "m1".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_failed_delete_rolls_back() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        gateway.forbid_deletes(true);
        let messenger = Messenger::new(gateway.clone());

        assert!(messenger.delete("c1", "m1").await.is_err());
        assert!(!messenger.was_deleted_by_bot("m1"));
    }

    #[tokio::test]
    async fn test_deleted_history_is_bounded() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let messenger = Messenger::new(gateway);

        for i in 0..=DELETED_HISTORY {
            messenger.delete("c1", &format!("m{i}")).await.unwrap();
        }
        assert!(!messenger.was_deleted_by_bot("m0"));
        assert!(messenger.was_deleted_by_bot("m1"));
        assert!(messenger.was_deleted_by_bot(&format!("m{DELETED_HISTORY}")));
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_full_history() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let messenger = Messenger::new(gateway.clone());

        for i in 0..DELETED_HISTORY {
            messenger.delete("c1", &format!("m{i}")).await.unwrap();
        }
        gateway.forbid_deletes(true);

        assert!(messenger.delete("c1", "mx").await.is_err());
        assert!(!messenger.was_deleted_by_bot("mx"));
        assert!(messenger.was_deleted_by_bot("m0"));
        assert!(messenger.was_deleted_by_bot(&format!("m{}", DELETED_HISTORY - 1)));
    }
}
