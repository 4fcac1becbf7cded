//! Handler contract for the Alexis engine.
//!
//! A handler is a unit of reactive logic. What triggers it and which gates
//! apply to it are declared as data in a [`HandlerSpec`]; the behaviour is
//! the [`Handler::handle`] method. The dispatcher never inspects a handler
//! beyond its spec.
//!
//! # Triggers
//!
//! A single handler may combine several triggers:
//!
//! - **command**: invoked when the parsed command name equals its name or
//!   one of its aliases
//! - **prefix**: invoked when the raw text starts with one of its prefixes
//! - **event**: invoked for every event whose name it subscribes to
//! - **mention**: invoked when the raw text opens with a mention of the bot
//!
//! # Example
//!
//! ```rust,ignore
//! use alexis_framework::{HandlerSpec, handler_fn};
//!
//! let ping = handler_fn(HandlerSpec::command("ping").alias("p"), |ctx| async move {
//!     ctx.answer("pong").await?;
//!     Ok(())
//! });
//! ```

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::context::CommandContext;
use crate::error::HandlerResult;
use crate::messenger::Messenger;

/// Default reply for handlers that refuse private messages.
pub const DEFAULT_PRIVATE_DENIAL: &str = "this command is not allowed via private message";
/// Default reply for owner-only handlers.
pub const DEFAULT_OWNER_DENIAL: &str = "you can't use this command";
/// Default reply while a cooldown is active. `{remaining}` is replaced with
/// the remaining whole seconds.
pub const DEFAULT_COOLDOWN_DENIAL: &str = "you can't use this command yet, wait {remaining}s";

/// Replies sent when a gate denies a handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialTexts {
    pub private: String,
    pub owner: String,
    pub cooldown: String,
}

impl Default for DenialTexts {
    fn default() -> Self {
        Self {
            private: DEFAULT_PRIVATE_DENIAL.to_string(),
            owner: DEFAULT_OWNER_DENIAL.to_string(),
            cooldown: DEFAULT_COOLDOWN_DENIAL.to_string(),
        }
    }
}

/// Declarative description of a handler: triggers and gating constraints.
///
/// Built once when the plugin is constructed and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    name: String,
    command: bool,
    aliases: Vec<String>,
    prefixes: Vec<String>,
    command_prefix: bool,
    events: Vec<String>,
    mention: bool,
    allow_private: bool,
    owner_only: bool,
    bot_owner_only: bool,
    cooldown: Duration,
    short_circuit: bool,
    accepts_self: bool,
    denials: DenialTexts,
}

impl HandlerSpec {
    /// A handler with a name and no trigger yet.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            command: false,
            aliases: Vec::new(),
            prefixes: Vec::new(),
            command_prefix: false,
            events: Vec::new(),
            mention: false,
            allow_private: true,
            owner_only: false,
            bot_owner_only: false,
            cooldown: Duration::ZERO,
            short_circuit: false,
            accepts_self: false,
            denials: DenialTexts::default(),
        }
    }

    /// An ordinary command invoked by its name.
    pub fn command(name: impl Into<String>) -> Self {
        let mut spec = Self::new(name);
        spec.command = true;
        spec
    }

    /// Adds a command alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Adds a raw-text prefix trigger.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefixes.push(prefix.into());
        self
    }

    /// Also triggers on the command prefix in effect for the event, with or
    /// without a space after it. Servers may configure their own prefix.
    pub fn on_command_prefix(mut self) -> Self {
        self.command_prefix = true;
        self
    }

    /// Subscribes to an event by name (e.g. `"member_join"`).
    pub fn on_event(mut self, event_name: impl Into<String>) -> Self {
        self.events.push(event_name.into());
        self
    }

    /// Reacts to messages that open with a mention of the bot.
    pub fn on_mention(mut self) -> Self {
        self.mention = true;
        self
    }

    /// Whether the handler may run in private conversations (default `true`).
    pub fn allow_private(mut self, allow: bool) -> Self {
        self.allow_private = allow;
        self
    }

    /// Restricts the handler to server owners.
    pub fn owner_only(mut self, owner_only: bool) -> Self {
        self.owner_only = owner_only;
        self
    }

    /// Restricts the handler to the configured bot owners.
    pub fn bot_owner_only(mut self, bot_owner_only: bool) -> Self {
        self.bot_owner_only = bot_owner_only;
        self
    }

    /// Minimum interval between two allowed invocations by the same caller.
    pub fn cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Stops later handlers of the same class once this one ran.
    pub fn short_circuit(mut self, short_circuit: bool) -> Self {
        self.short_circuit = short_circuit;
        self
    }

    /// Opts in to events originated by the bot itself.
    pub fn accept_self(mut self, accept: bool) -> Self {
        self.accepts_self = accept;
        self
    }

    pub fn private_denial(mut self, text: impl Into<String>) -> Self {
        self.denials.private = text.into();
        self
    }

    pub fn owner_denial(mut self, text: impl Into<String>) -> Self {
        self.denials.owner = text.into();
        self
    }

    pub fn cooldown_denial(mut self, text: impl Into<String>) -> Self {
        self.denials.cooldown = text.into();
        self
    }

    // ─── Accessors ───────────────────────────────────────────────────────────

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the handler is an ordinary command.
    pub fn is_command(&self) -> bool {
        self.command
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Command name followed by aliases; empty for non-command handlers.
    pub fn command_names(&self) -> impl Iterator<Item = &str> {
        let names = if self.command {
            Some(std::iter::once(self.name.as_str()).chain(self.aliases.iter().map(String::as_str)))
        } else {
            None
        };
        names.into_iter().flatten()
    }

    pub fn prefixes(&self) -> &[String] {
        &self.prefixes
    }

    /// Whether the event's command prefix is a trigger.
    pub fn uses_command_prefix(&self) -> bool {
        self.command_prefix
    }

    pub fn events(&self) -> &[String] {
        &self.events
    }

    pub fn is_mention_handler(&self) -> bool {
        self.mention
    }

    pub fn allows_private(&self) -> bool {
        self.allow_private
    }

    pub fn is_owner_only(&self) -> bool {
        self.owner_only
    }

    pub fn is_bot_owner_only(&self) -> bool {
        self.bot_owner_only
    }

    pub fn cooldown_duration(&self) -> Duration {
        self.cooldown
    }

    pub fn is_short_circuit(&self) -> bool {
        self.short_circuit
    }

    pub fn accepts_self(&self) -> bool {
        self.accepts_self
    }

    pub fn denials(&self) -> &DenialTexts {
        &self.denials
    }

    /// The first declared prefix `text` starts with.
    pub fn matching_prefix(&self, text: &str) -> Option<&str> {
        self.prefixes
            .iter()
            .map(String::as_str)
            .find(|prefix| text.starts_with(prefix))
    }

    /// The leading part of `text` that triggers this handler, given the
    /// event's `command_prefix`.
    ///
    /// The command prefix, spaced form first, is tried before the declared
    /// prefixes.
    pub fn matched_trigger<'t>(&self, text: &'t str, command_prefix: &str) -> Option<&'t str> {
        if self.command_prefix
            && !command_prefix.is_empty()
            && let Some(rest) = text.strip_prefix(command_prefix)
        {
            let len = if rest.starts_with(' ') {
                command_prefix.len() + 1
            } else {
                command_prefix.len()
            };
            return Some(&text[..len]);
        }
        self.matching_prefix(text).map(|prefix| &text[..prefix.len()])
    }
}

// ============================================================================
// Handler Trait
// ============================================================================

/// A loaded handler.
///
/// Implementations keep any mutable state behind interior mutability; the
/// dispatcher only ever holds shared references.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    /// Triggers and gates of this handler.
    fn spec(&self) -> &HandlerSpec;

    /// Runs the handler for one event that passed its gates.
    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult;

    /// Period of [`tick`](Self::tick), if the handler wants to be scheduled.
    fn interval(&self) -> Option<Duration> {
        None
    }

    /// Periodic work driven by the runtime.
    async fn tick(&self, _messenger: &Messenger) -> HandlerResult {
        Ok(())
    }
}

/// A shared handler trait object.
pub type BoxedHandler = Arc<dyn Handler>;

// ============================================================================
// Closure handlers
// ============================================================================

/// A [`Handler`] built from a spec and an async closure.
pub struct FnHandler<F> {
    spec: HandlerSpec,
    f: F,
}

/// Builds a handler from a spec and an async closure.
///
/// ```rust,ignore
/// let greet = handler_fn(HandlerSpec::new("greet").on_event("member_join"), |ctx| async move {
///     ctx.answer("welcome!").await?;
///     Ok(())
/// });
/// ```
pub fn handler_fn<F, Fut>(spec: HandlerSpec, f: F) -> FnHandler<F>
where
    F: Fn(Arc<CommandContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    FnHandler { spec, f }
}

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Arc<CommandContext>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        (self.f)(ctx).await
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnHandler")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_names_include_aliases() {
        let spec = HandlerSpec::command("isetcolour").alias("isetcolor");
        let names: Vec<&str> = spec.command_names().collect();
        assert_eq!(names, vec!["isetcolour", "isetcolor"]);
    }

    #[test]
    fn test_non_command_has_no_command_names() {
        let spec = HandlerSpec::new("macro-use").prefix("!").alias("ignored");
        assert_eq!(spec.command_names().count(), 0);
    }

    #[test]
    fn test_defaults() {
        let spec = HandlerSpec::command("ping");
        assert!(spec.allows_private());
        assert!(!spec.is_owner_only());
        assert!(!spec.accepts_self());
        assert_eq!(spec.cooldown_duration(), Duration::ZERO);
        assert_eq!(spec.denials().private, DEFAULT_PRIVATE_DENIAL);
    }

    #[test]
    fn test_matching_prefix_uses_declaration_order() {
        let spec = HandlerSpec::new("macro-use").prefix("! ").prefix("!");
        assert_eq!(spec.matching_prefix("! hello"), Some("! "));
        assert_eq!(spec.matching_prefix("!hello"), Some("!"));
        assert_eq!(spec.matching_prefix("hello"), None);
    }

    #[test]
    fn test_command_prefix_trigger_follows_event_prefix() {
        let spec = HandlerSpec::new("macro-use").on_command_prefix().prefix("¡");
        assert!(spec.uses_command_prefix());
        assert_eq!(spec.matched_trigger("?? hello", "??"), Some("?? "));
        assert_eq!(spec.matched_trigger("??hello", "??"), Some("??"));
        assert_eq!(spec.matched_trigger("!hello", "??"), None);
        assert_eq!(spec.matched_trigger("¡hello", "??"), Some("¡"));
        assert_eq!(spec.matched_trigger("hello", ""), None);
    }
}
