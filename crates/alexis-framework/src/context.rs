//! Invocation data and the context handed to handlers.
//!
//! Two layers model how one event reaches several handlers:
//!
//! - [`Invocation`]: the **shared** view of one inbound event. Built once by
//!   the dispatcher, wrapped in an `Arc` and cloned into every handler turn.
//!   It never changes after construction.
//! - [`CommandContext`]: the **per-turn** facade a handler works through.
//!   It pairs the invocation with the engine services (messenger, stores,
//!   shared state) and owns the turn's typing indicator.

use std::sync::Arc;
use std::time::Duration;

use alexis_core::{
    BoxedServerConfig, BoxedStore, Channel, Embed, Event, Gateway, GatewayError, GatewayResult,
    Member, OutboundMessage, SentMessage, User,
};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::messenger::Messenger;
use crate::parser::{ParsedCommand, parse_user_mention};
use crate::state::SharedState;

/// How often an active typing indicator is refreshed.
pub const TYPING_REFRESH: Duration = Duration::from_secs(8);

// =============================================================================
// Invocation
// =============================================================================

/// Everything the engine resolved about one inbound event.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub event: Event,
    pub caller: Option<User>,
    /// The caller's membership in the event's server.
    pub member: Option<Member>,
    pub channel: Option<Channel>,
    pub server_id: Option<String>,
    /// The parsed command, for message events that look like one.
    pub command: Option<ParsedCommand>,
    pub raw_text: String,
    pub is_private: bool,
    /// The event was caused by the bot itself.
    pub is_self: bool,
    /// Command prefix in effect for the event's server.
    pub prefix: String,
    /// Owner-role list in effect for the event's server.
    pub owner_roles: Vec<String>,
    /// Language configured for the event's server.
    pub lang: String,
}

impl Invocation {
    /// Builds an invocation with no server-specific settings resolved.
    pub fn new(event: Event, self_id: &str, prefix: impl Into<String>) -> Self {
        let caller = event.caller().cloned();
        let member = event.member().cloned();
        let channel = event.channel().cloned();
        let server_id = event.server_id().map(str::to_string);
        let raw_text = event.text().to_string();
        let is_private = channel.as_ref().is_some_and(Channel::is_private);
        let is_self = caller.as_ref().is_some_and(|user| user.id == self_id);
        let prefix = prefix.into();
        let command = event
            .as_message()
            .and_then(|_| crate::parser::parse(&raw_text, &prefix));

        Self {
            event,
            caller,
            member,
            channel,
            server_id,
            command,
            raw_text,
            is_private,
            is_self,
            prefix,
            owner_roles: Vec::new(),
            lang: String::new(),
        }
    }

    pub fn caller_id(&self) -> Option<&str> {
        self.caller.as_ref().map(|user| user.id.as_str())
    }

    pub fn channel_id(&self) -> Option<&str> {
        self.channel.as_ref().map(|channel| channel.id.as_str())
    }
}

// =============================================================================
// Engine services
// =============================================================================

/// Collaborators shared by the dispatcher and every handler turn.
#[derive(Clone)]
pub(crate) struct EngineServices {
    pub messenger: Arc<Messenger>,
    pub records: BoxedStore,
    pub server_config: BoxedServerConfig,
    pub state: Arc<SharedState>,
}

impl std::fmt::Debug for EngineServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineServices")
            .field("messenger", &self.messenger)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CommandContext
// =============================================================================

struct Typing {
    channel_id: String,
    token: CancellationToken,
    refresh: JoinHandle<()>,
}

/// The context handed to a handler for one turn.
pub struct CommandContext {
    invocation: Arc<Invocation>,
    services: EngineServices,
    handler: String,
    typing: Mutex<Option<Typing>>,
}

impl CommandContext {
    pub(crate) fn new(
        invocation: Arc<Invocation>,
        services: EngineServices,
        handler: impl Into<String>,
    ) -> Self {
        Self {
            invocation,
            services,
            handler: handler.into(),
            typing: Mutex::new(None),
        }
    }

    // ─── Invocation accessors ───────────────────────────────────────────────

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn event(&self) -> &Event {
        &self.invocation.event
    }

    /// Name of the handler this turn belongs to.
    pub fn handler_name(&self) -> &str {
        &self.handler
    }

    pub fn caller(&self) -> Option<&User> {
        self.invocation.caller.as_ref()
    }

    pub fn member(&self) -> Option<&Member> {
        self.invocation.member.as_ref()
    }

    pub fn channel(&self) -> Option<&Channel> {
        self.invocation.channel.as_ref()
    }

    pub fn server_id(&self) -> Option<&str> {
        self.invocation.server_id.as_deref()
    }

    pub fn command(&self) -> Option<&ParsedCommand> {
        self.invocation.command.as_ref()
    }

    /// Command arguments; empty when the event is not a command.
    pub fn argv(&self) -> &[String] {
        self.invocation
            .command
            .as_ref()
            .map(|command| command.args.as_slice())
            .unwrap_or_default()
    }

    pub fn argc(&self) -> usize {
        self.argv().len()
    }

    /// Text after the command name; empty when the event is not a command.
    pub fn text(&self) -> &str {
        self.invocation
            .command
            .as_ref()
            .map_or("", |command| command.text.as_str())
    }

    /// The full message text.
    pub fn raw_text(&self) -> &str {
        &self.invocation.raw_text
    }

    pub fn is_private(&self) -> bool {
        self.invocation.is_private
    }

    pub fn is_self(&self) -> bool {
        self.invocation.is_self
    }

    /// Command prefix in effect for this event.
    pub fn prefix(&self) -> &str {
        &self.invocation.prefix
    }

    /// Language configured for the event's server, or the default one.
    pub fn lang(&self) -> &str {
        &self.invocation.lang
    }

    // ─── Services ───────────────────────────────────────────────────────────

    pub fn messenger(&self) -> &Messenger {
        &self.services.messenger
    }

    pub fn records(&self) -> &BoxedStore {
        &self.services.records
    }

    pub fn server_config(&self) -> &BoxedServerConfig {
        &self.services.server_config
    }

    /// Id of the last non-bot message author seen by the engine.
    pub fn last_author(&self) -> Option<String> {
        self.services.state.last_author()
    }

    // ─── Replies ────────────────────────────────────────────────────────────

    /// Sends a text reply to the event's channel.
    pub async fn answer(&self, text: impl Into<String>) -> GatewayResult<SentMessage> {
        let channel_id = self.reply_channel()?;
        self.answer_with(OutboundMessage::text(channel_id, text)).await
    }

    /// Sends an embed reply to the event's channel.
    pub async fn answer_embed(&self, embed: Embed) -> GatewayResult<SentMessage> {
        let channel_id = self.reply_channel()?;
        self.answer_with(OutboundMessage::embed(channel_id, embed))
            .await
    }

    /// Sends a prepared message through the messenger.
    pub async fn answer_with(&self, message: OutboundMessage) -> GatewayResult<SentMessage> {
        self.services.messenger.send(message).await
    }

    fn reply_channel(&self) -> GatewayResult<String> {
        self.invocation
            .channel_id()
            .map(str::to_string)
            .ok_or_else(|| GatewayError::NotFound("event has no channel to answer in".into()))
    }

    // ─── Typing ─────────────────────────────────────────────────────────────

    /// Shows the typing indicator until this turn ends.
    ///
    /// Calling it again while typing is active does nothing.
    pub async fn typing(&self) -> GatewayResult<()> {
        let channel_id = self.reply_channel()?;
        if self.typing.lock().is_some() {
            return Ok(());
        }

        let gateway = Arc::clone(self.services.messenger.gateway());
        gateway.start_typing(&channel_id).await?;

        let token = CancellationToken::new();
        let refresh = tokio::spawn({
            let token = token.clone();
            let channel_id = channel_id.clone();
            async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(TYPING_REFRESH) => {
                            if let Err(e) = gateway.start_typing(&channel_id).await {
                                debug!(channel = %channel_id, error = %e, "Typing refresh failed");
                            }
                        }
                    }
                }
            }
        });

        let previous = self.typing.lock().replace(Typing {
            channel_id,
            token,
            refresh,
        });
        if let Some(previous) = previous {
            previous.token.cancel();
        }
        Ok(())
    }

    /// Whether a typing indicator is active for this turn.
    pub fn is_typing(&self) -> bool {
        self.typing.lock().is_some()
    }

    /// Ends the turn: stops the typing indicator if one was started.
    pub(crate) async fn settle(&self) {
        let Some(typing) = self.typing.lock().take() else {
            return;
        };
        typing.token.cancel();
        let _ = typing.refresh.await;

        if let Err(e) = self
            .services
            .messenger
            .gateway()
            .stop_typing(&typing.channel_id)
            .await
        {
            warn!(channel = %typing.channel_id, error = %e, "Failed to clear typing indicator");
        }
    }

    // ─── Member resolution ──────────────────────────────────────────────────

    /// Resolves a member of the event's server from an id or a mention.
    ///
    /// Returns `Ok(None)` outside a server or when no such member exists.
    pub async fn resolve_member(&self, id_or_mention: &str) -> GatewayResult<Option<Member>> {
        let Some(server_id) = self.server_id() else {
            return Ok(None);
        };
        let trimmed = id_or_mention.trim();
        let user_id = parse_user_mention(trimmed).unwrap_or(trimmed);
        if user_id.is_empty() {
            return Ok(None);
        }

        if let Some(member) = self.member()
            && member.id() == user_id
        {
            return Ok(Some(member.clone()));
        }

        self.services
            .messenger
            .gateway()
            .member(server_id, user_id)
            .await
    }
}

impl std::fmt::Debug for CommandContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandContext")
            .field("handler", &self.handler)
            .field("event", &self.invocation.event.name())
            .field("is_typing", &self.is_typing())
            .finish_non_exhaustive()
    }
}
