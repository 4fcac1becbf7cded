//! Event dispatcher for the Alexis engine.
//!
//! The [`Dispatcher`] receives one [`Event`] at a time, resolves it into an
//! [`Invocation`] and routes it to the handlers of the [`HandlerRegistry`].
//!
//! # Routing
//!
//! Candidates are collected in four classes, visited in this order:
//!
//! 1. **primary**: the command named by the parsed message text
//! 2. **prefix**: handlers whose raw prefix starts the message text
//! 3. **subscribers**: handlers subscribed to the event's name
//! 4. **mention**: handlers reacting to a leading mention of the bot
//!
//! Inside a class handlers run in registration order, one after the other.
//! Each candidate goes through the gate, then the cooldown, and runs only
//! when both allow it. A handler runs at most once per event, in the first
//! class it appears in. A short-circuiting handler that was allowed to run
//! stops the rest of its class; the other classes are unaffected.
//!
//! Handler errors and panics are caught here and never reach the caller.
//!
//! ```rust,ignore
//! use alexis_framework::{DispatcherBuilder, HandlerRegistry};
//!
//! let dispatcher = DispatcherBuilder::new(registry, gateway)
//!     .records(store)
//!     .build();
//!
//! let report = dispatcher.dispatch(event).await;
//! ```

use std::any::Any;
use std::collections::HashSet;
use std::convert::Infallible;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use alexis_core::{
    BoxedGateway, BoxedServerConfig, BoxedStore, Event, Gateway, MemoryStore,
    RecordServerConfig, ServerConfig,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tower::Service;
use tracing::{Instrument, debug, error, info_span, warn};

use crate::context::{CommandContext, EngineServices, Invocation};
use crate::cooldown::{CooldownDecision, CooldownTracker, remaining_secs};
use crate::gate::{Denial, GateDecision, GateSubject, evaluate, parse_owner_roles};
use crate::handler::BoxedHandler;
use crate::messenger::{BoxedPreSendHook, Messenger};
use crate::parser::strip_self_mention;
use crate::registry::HandlerRegistry;
use crate::state::SharedState;

/// Server config key holding the command prefix.
pub const PREFIX_KEY: &str = "command_prefix";
/// Server config key holding the owner-role list, one entry per line.
pub const OWNER_ROLES_KEY: &str = "owner_roles";
/// Server config key holding the server's language.
pub const LANG_KEY: &str = "lang";

// =============================================================================
// Settings
// =============================================================================

/// Engine-wide behaviour knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherSettings {
    /// Prefix used when a server has none configured, and in private.
    pub command_prefix: String,
    /// User ids allowed to run bot-owner-only handlers.
    pub bot_owners: Vec<String>,
    /// Owner-role list used when a server has none configured.
    pub owner_roles: Vec<String>,
    /// Language used when a server has none configured, and in private.
    pub default_lang: String,
    /// Answer rate-limited invocations with the cooldown text.
    pub reply_on_cooldown: bool,
    /// Reply sent when a handler fails; `None` keeps failures silent.
    pub fault_reply: Option<String>,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            command_prefix: "!".to_string(),
            bot_owners: Vec::new(),
            owner_roles: Vec::new(),
            default_lang: "es_CL".to_string(),
            reply_on_cooldown: true,
            fault_reply: None,
        }
    }
}

// =============================================================================
// Results
// =============================================================================

/// What happened to one candidate handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchResult {
    Completed,
    Denied(Denial),
    RateLimited { remaining: Duration },
    Failed(String),
}

impl DispatchResult {
    /// Whether the handler body was invoked.
    pub fn ran(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_))
    }
}

/// Outcome of one candidate, in dispatch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOutcome {
    pub handler: String,
    pub result: DispatchResult,
}

/// Everything the dispatcher did for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event: &'static str,
    pub outcomes: Vec<HandlerOutcome>,
}

impl DispatchReport {
    /// The result for a handler, if it was a candidate.
    pub fn outcome(&self, handler: &str) -> Option<&DispatchResult> {
        self.outcomes
            .iter()
            .find(|outcome| outcome.handler == handler)
            .map(|outcome| &outcome.result)
    }

    /// Names of the handlers whose body was invoked, in order.
    pub fn ran(&self) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|outcome| outcome.result.ran())
            .map(|outcome| outcome.handler.as_str())
            .collect()
    }

    /// Returns `true` if no handler was a candidate.
    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Assembles a [`Dispatcher`] from its collaborators.
pub struct DispatcherBuilder {
    registry: HandlerRegistry,
    gateway: BoxedGateway,
    records: Option<BoxedStore>,
    server_config: Option<BoxedServerConfig>,
    settings: DispatcherSettings,
    hooks: Vec<BoxedPreSendHook>,
}

impl DispatcherBuilder {
    pub fn new(registry: HandlerRegistry, gateway: BoxedGateway) -> Self {
        Self {
            registry,
            gateway,
            records: None,
            server_config: None,
            settings: DispatcherSettings::default(),
            hooks: Vec::new(),
        }
    }

    /// Record store handed to handlers. Defaults to an in-memory store.
    pub fn records(mut self, records: BoxedStore) -> Self {
        self.records = Some(records);
        self
    }

    /// Per-server settings. Defaults to settings kept in the record store.
    pub fn server_config(mut self, server_config: BoxedServerConfig) -> Self {
        self.server_config = Some(server_config);
        self
    }

    pub fn settings(mut self, settings: DispatcherSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Adds a hook run before every outbound message.
    pub fn pre_send_hook(mut self, hook: BoxedPreSendHook) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn build(self) -> Dispatcher {
        let records: BoxedStore = self
            .records
            .unwrap_or_else(|| Arc::new(MemoryStore::new()));
        let server_config: BoxedServerConfig = self
            .server_config
            .unwrap_or_else(|| Arc::new(RecordServerConfig::new(Arc::clone(&records))));
        let messenger = self
            .hooks
            .into_iter()
            .fold(Messenger::new(self.gateway), Messenger::with_hook);

        Dispatcher {
            inner: Arc::new(DispatcherInner {
                registry: self.registry,
                services: EngineServices {
                    messenger: Arc::new(messenger),
                    records,
                    server_config,
                    state: Arc::new(SharedState::new()),
                },
                cooldowns: CooldownTracker::new(),
                settings: self.settings,
            }),
        }
    }
}

// =============================================================================
// Dispatcher
// =============================================================================

struct DispatcherInner {
    registry: HandlerRegistry,
    services: EngineServices,
    cooldowns: CooldownTracker,
    settings: DispatcherSettings,
}

/// Routes events to handlers.
///
/// Cloning is cheap: clones share the registry, the cooldown state and the
/// messenger.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

/// The four candidate classes, in dispatch order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TriggerClass {
    Primary,
    Prefix,
    Subscriber,
    Mention,
}

impl TriggerClass {
    fn as_str(self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Prefix => "prefix",
            Self::Subscriber => "subscriber",
            Self::Mention => "mention",
        }
    }
}

impl Dispatcher {
    pub fn registry(&self) -> &HandlerRegistry {
        &self.inner.registry
    }

    pub fn messenger(&self) -> &Arc<Messenger> {
        &self.inner.services.messenger
    }

    pub fn records(&self) -> &BoxedStore {
        &self.inner.services.records
    }

    pub fn server_config(&self) -> &BoxedServerConfig {
        &self.inner.services.server_config
    }

    pub fn settings(&self) -> &DispatcherSettings {
        &self.inner.settings
    }

    pub fn state(&self) -> &SharedState {
        &self.inner.services.state
    }

    /// Dispatches one event and reports what each candidate did.
    pub async fn dispatch(&self, event: Event) -> DispatchReport {
        let span = info_span!("dispatch", event = event.name());
        self.dispatch_event(event).instrument(span).await
    }

    async fn dispatch_event(&self, event: Event) -> DispatchReport {
        let event_name = event.name();
        let mut invocation = self.resolve(event).await;

        if invocation.event.as_message().is_some()
            && !invocation.is_self
            && let Some(author) = invocation.caller_id()
        {
            self.inner.services.state.set_last_author(author);
        }

        let classes = self.candidates(&invocation);
        if classes.iter().flat_map(|(_, handlers)| handlers).any(|h| h.spec().is_owner_only()) {
            self.resolve_member(&mut invocation).await;
        }
        let invocation = Arc::new(invocation);

        let mut seen = HashSet::new();
        let mut outcomes = Vec::new();
        for (class, handlers) in classes {
            for handler in handlers {
                let name = handler.spec().name();
                if !seen.insert(name.to_string()) {
                    continue;
                }

                let result = self.run_turn(&invocation, &handler).await;
                let stop = handler.spec().is_short_circuit() && result.ran();
                outcomes.push(HandlerOutcome {
                    handler: name.to_string(),
                    result,
                });

                if stop {
                    debug!(
                        handler = name,
                        class = class.as_str(),
                        "Short-circuit handler ran, skipping rest of class"
                    );
                    break;
                }
            }
        }

        debug!(candidates = outcomes.len(), "Dispatch finished");
        DispatchReport {
            event: event_name,
            outcomes,
        }
    }

    /// Builds the invocation, applying the server's prefix, owner roles and
    /// language.
    async fn resolve(&self, event: Event) -> Invocation {
        let settings = &self.inner.settings;
        let server_config = &self.inner.services.server_config;
        let self_id = self.inner.services.messenger.self_id().to_string();

        let server_id = event.server_id().map(str::to_string);
        let prefix = match &server_id {
            Some(server_id) => {
                server_config
                    .get_or(server_id, PREFIX_KEY, &settings.command_prefix)
                    .await
            }
            None => settings.command_prefix.clone(),
        };

        let mut invocation = Invocation::new(event, &self_id, prefix);
        invocation.owner_roles = match &server_id {
            Some(server_id) => match server_config.get(server_id, OWNER_ROLES_KEY).await {
                Some(value) => parse_owner_roles(&value),
                None => settings.owner_roles.clone(),
            },
            None => settings.owner_roles.clone(),
        };
        invocation.lang = match &server_id {
            Some(server_id) => {
                server_config
                    .get_or(server_id, LANG_KEY, &settings.default_lang)
                    .await
            }
            None => settings.default_lang.clone(),
        };
        invocation
    }

    async fn resolve_member(&self, invocation: &mut Invocation) {
        if invocation.member.is_some() {
            return;
        }
        let (Some(server_id), Some(caller)) = (&invocation.server_id, invocation.caller_id())
        else {
            return;
        };

        match self
            .inner
            .services
            .messenger
            .gateway()
            .member(server_id, caller)
            .await
        {
            Ok(member) => invocation.member = member,
            Err(e) => debug!(server = %server_id, caller, error = %e, "Member lookup failed"),
        }
    }

    fn candidates(&self, invocation: &Invocation) -> Vec<(TriggerClass, Vec<BoxedHandler>)> {
        let registry = &self.inner.registry;
        let is_message = invocation.event.as_message().is_some();
        let raw = invocation.raw_text.as_str();

        let primary = invocation
            .command
            .as_ref()
            .and_then(|command| registry.lookup(&command.name))
            .cloned()
            .into_iter()
            .collect();

        let prefix = if is_message {
            registry
                .prefix_handlers()
                .into_iter()
                .filter(|handler| {
                    handler
                        .spec()
                        .matched_trigger(raw, &invocation.prefix)
                        .is_some()
                })
                .cloned()
                .collect()
        } else {
            Vec::new()
        };

        let subscribers = registry
            .subscribers(invocation.event.name())
            .into_iter()
            .cloned()
            .collect();

        let self_id = self.inner.services.messenger.self_id();
        let mention = if is_message && strip_self_mention(raw, self_id).is_some() {
            registry.mention_handlers().into_iter().cloned().collect()
        } else {
            Vec::new()
        };

        vec![
            (TriggerClass::Primary, primary),
            (TriggerClass::Prefix, prefix),
            (TriggerClass::Subscriber, subscribers),
            (TriggerClass::Mention, mention),
        ]
    }

    /// Gates, rate-checks and runs one handler.
    async fn run_turn(
        &self,
        invocation: &Arc<Invocation>,
        handler: &BoxedHandler,
    ) -> DispatchResult {
        let spec = handler.spec();
        let name = spec.name();

        let subject = GateSubject {
            is_private: invocation.is_private,
            is_self: invocation.is_self,
            caller_id: invocation.caller_id(),
            member: invocation.member.as_ref(),
            bot_owners: &self.inner.settings.bot_owners,
            owner_roles: &invocation.owner_roles,
        };
        if let GateDecision::Deny(denial) = evaluate(spec, &subject) {
            debug!(handler = name, %denial, "Handler denied");
            if denial.is_visible() && !invocation.is_self {
                let text = match denial {
                    Denial::NoPrivateMessage => &spec.denials().private,
                    _ => &spec.denials().owner,
                };
                self.reply(invocation, text).await;
            }
            return DispatchResult::Denied(denial);
        }

        if let Some(caller) = invocation.caller_id()
            && let CooldownDecision::Deny { remaining } =
                self.inner
                    .cooldowns
                    .check(name, caller, spec.cooldown_duration())
        {
            debug!(handler = name, caller, ?remaining, "Handler rate limited");
            if self.inner.settings.reply_on_cooldown && !invocation.is_self {
                let text = spec
                    .denials()
                    .cooldown
                    .replace("{remaining}", &remaining_secs(remaining).to_string());
                self.reply(invocation, &text).await;
            }
            return DispatchResult::RateLimited { remaining };
        }

        let ctx = Arc::new(CommandContext::new(
            Arc::clone(invocation),
            self.inner.services.clone(),
            name,
        ));
        let outcome = AssertUnwindSafe(handler.handle(Arc::clone(&ctx)))
            .catch_unwind()
            .await;
        ctx.settle().await;

        let fault = match outcome {
            Ok(Ok(())) => {
                debug!(handler = name, "Handler completed");
                return DispatchResult::Completed;
            }
            Ok(Err(e)) => format!("{e:#}"),
            Err(panic) => format!("handler panicked: {}", panic_message(panic.as_ref())),
        };

        error!(
            handler = name,
            caller = invocation.caller_id().unwrap_or("-"),
            text = %invocation.raw_text,
            error = %fault,
            "Handler failed"
        );
        if let Some(reply) = &self.inner.settings.fault_reply
            && !invocation.is_self
        {
            self.reply(invocation, reply).await;
        }
        DispatchResult::Failed(fault)
    }

    async fn reply(&self, invocation: &Invocation, text: &str) {
        let Some(channel_id) = invocation.channel_id() else {
            return;
        };
        if let Err(e) = self
            .inner
            .services
            .messenger
            .send_text(channel_id, text)
            .await
        {
            warn!(channel = channel_id, error = %e, "Failed to send engine reply");
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.inner.registry)
            .field("settings", &self.inner.settings)
            .finish_non_exhaustive()
    }
}

impl Service<Event> for Dispatcher {
    type Response = DispatchReport;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<DispatchReport, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, event: Event) -> Self::Future {
        let dispatcher = self.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(event).await) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{DEFAULT_PRIVATE_DENIAL, HandlerSpec, handler_fn};
    use alexis_core::testing::{GatewayCall, RecordingGateway};
    use alexis_core::{Channel, Member, Message, Role, User};
    use parking_lot::Mutex;
    use tower::ServiceExt;

    type Log = Arc<Mutex<Vec<String>>>;

    fn recorder(spec: HandlerSpec, log: &Log) -> BoxedHandler {
        let log = Arc::clone(log);
        let name = spec.name().to_string();
        Arc::new(handler_fn(spec, move |_ctx| {
            let log = Arc::clone(&log);
            let name = name.clone();
            async move {
                log.lock().push(name);
                Ok(())
            }
        }))
    }

    fn message(author: &str, channel: Channel, content: &str) -> Event {
        Event::MessageCreated(Message::new("m1", channel, User::new(author, "someone"), content))
    }

    fn in_server(author: &str, content: &str) -> Event {
        message(author, Channel::server("c1", "s1"), content)
    }

    fn setup(registry: HandlerRegistry) -> (Dispatcher, Arc<RecordingGateway>) {
        setup_with(registry, DispatcherSettings::default())
    }

    fn setup_with(
        registry: HandlerRegistry,
        settings: DispatcherSettings,
    ) -> (Dispatcher, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let dispatcher = DispatcherBuilder::new(registry, gateway.clone())
            .settings(settings)
            .build();
        (dispatcher, gateway)
    }

    #[tokio::test]
    async fn test_command_reaches_handler() {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let registry = HandlerRegistry::new()
            .with(Arc::new(handler_fn(
                HandlerSpec::command("echo").alias("e"),
                |ctx| async move {
                    ctx.answer(format!("{}:{}", ctx.argc(), ctx.text())).await?;
                    Ok(())
                },
            )))
            .unwrap();
        let dispatcher = DispatcherBuilder::new(registry, gateway.clone()).build();

        let report = dispatcher.dispatch(in_server("u1", "!e a  b")).await;
        assert_eq!(report.event, "message");
        assert_eq!(report.ran(), vec!["echo"]);
        assert_eq!(gateway.sent_texts(), vec!["2:a  b"]);
    }

    #[tokio::test]
    async fn test_private_denial_replies_exactly_once() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::command("list").allow_private(false), &log))
            .unwrap();
        let (dispatcher, gateway) = setup(registry);

        let report = dispatcher
            .dispatch(message("u1", Channel::private("d1"), "!list"))
            .await;

        assert_eq!(
            report.outcome("list"),
            Some(&DispatchResult::Denied(Denial::NoPrivateMessage))
        );
        assert!(log.lock().is_empty());
        assert_eq!(gateway.sent_texts(), vec![DEFAULT_PRIVATE_DENIAL]);
    }

    #[tokio::test]
    async fn test_short_circuit_stops_own_class_only() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::new("first").prefix("!").short_circuit(true), &log))
            .unwrap()
            .with(recorder(HandlerSpec::new("second").prefix("!"), &log))
            .unwrap()
            .with(recorder(HandlerSpec::new("watcher").on_event("message"), &log))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);

        let report = dispatcher.dispatch(in_server("u1", "!hello")).await;
        assert_eq!(*log.lock(), vec!["first", "watcher"]);
        assert!(report.outcome("second").is_none());
    }

    #[tokio::test]
    async fn test_denied_short_circuit_does_not_stop_class() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(
                HandlerSpec::new("first").prefix("!").short_circuit(true).owner_only(true),
                &log,
            ))
            .unwrap()
            .with(recorder(HandlerSpec::new("second").prefix("!"), &log))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);

        dispatcher.dispatch(in_server("u1", "!hello")).await;
        assert_eq!(*log.lock(), vec!["second"]);
    }

    #[tokio::test]
    async fn test_class_order_and_single_run() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::new("mentioned").on_mention(), &log))
            .unwrap()
            .with(recorder(HandlerSpec::new("watcher").on_event("message"), &log))
            .unwrap()
            .with(recorder(
                HandlerSpec::command("ping").on_event("message").prefix("!"),
                &log,
            ))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);

        dispatcher.dispatch(in_server("u1", "!ping")).await;
        assert_eq!(*log.lock(), vec!["ping", "watcher"]);

        log.lock().clear();
        dispatcher.dispatch(in_server("u1", "<@42> hi")).await;
        assert_eq!(*log.lock(), vec!["watcher", "ping", "mentioned"]);
    }

    #[tokio::test]
    async fn test_self_events_are_silent() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::command("ping"), &log))
            .unwrap()
            .with(recorder(HandlerSpec::command("list").allow_private(false), &log))
            .unwrap()
            .with(recorder(
                HandlerSpec::new("own").on_event("message").accept_self(true),
                &log,
            ))
            .unwrap();
        let (dispatcher, gateway) = setup(registry);

        let report = dispatcher.dispatch(in_server("42", "!ping")).await;
        assert_eq!(
            report.outcome("ping"),
            Some(&DispatchResult::Denied(Denial::Ignored))
        );

        let report = dispatcher
            .dispatch(message("42", Channel::private("d1"), "!list"))
            .await;
        assert_eq!(
            report.outcome("list"),
            Some(&DispatchResult::Denied(Denial::NoPrivateMessage))
        );

        assert_eq!(*log.lock(), vec!["own", "own"]);
        assert!(gateway.sent().is_empty());
        assert_eq!(dispatcher.state().last_author(), None);
    }

    #[tokio::test]
    async fn test_faults_are_isolated() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(Arc::new(handler_fn(
                HandlerSpec::new("broken").on_event("message"),
                |_ctx| async { anyhow::bail!("database is gone") },
            )))
            .unwrap()
            .with(Arc::new(handler_fn(
                HandlerSpec::new("panicky").on_event("message"),
                |_ctx| async { panic!("boom") },
            )))
            .unwrap()
            .with(recorder(HandlerSpec::new("healthy").on_event("message"), &log))
            .unwrap();
        let settings = DispatcherSettings {
            fault_reply: Some("something went wrong".into()),
            ..Default::default()
        };
        let (dispatcher, gateway) = setup_with(registry, settings);

        let report = dispatcher.dispatch(in_server("u1", "hello")).await;
        assert_eq!(
            report.outcome("broken"),
            Some(&DispatchResult::Failed("database is gone".into()))
        );
        assert_eq!(
            report.outcome("panicky"),
            Some(&DispatchResult::Failed("handler panicked: boom".into()))
        );
        assert_eq!(*log.lock(), vec!["healthy"]);
        assert_eq!(
            gateway.sent_texts(),
            vec!["something went wrong", "something went wrong"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_reply() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(
                HandlerSpec::command("roll")
                    .cooldown(Duration::from_secs(10))
                    .cooldown_denial("slow down, {remaining}s left"),
                &log,
            ))
            .unwrap();
        let (dispatcher, gateway) = setup(registry);

        dispatcher.dispatch(in_server("u1", "!roll")).await;
        tokio::time::advance(Duration::from_millis(2500)).await;
        let report = dispatcher.dispatch(in_server("u1", "!roll")).await;

        assert!(matches!(
            report.outcome("roll"),
            Some(DispatchResult::RateLimited { .. })
        ));
        assert_eq!(gateway.sent_texts(), vec!["slow down, 8s left"]);

        // Another caller is unaffected.
        dispatcher.dispatch(in_server("u2", "!roll")).await;
        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_cooldown_keeps_other_candidates() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(
                HandlerSpec::command("once").cooldown(Duration::MAX),
                &log,
            ))
            .unwrap()
            .with(recorder(HandlerSpec::new("watch").prefix("!"), &log))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);

        dispatcher.dispatch(in_server("u1", "!once")).await;
        let report = dispatcher.dispatch(in_server("u1", "!once")).await;

        assert!(matches!(
            report.outcome("once"),
            Some(DispatchResult::RateLimited { .. })
        ));
        assert_eq!(report.outcome("watch"), Some(&DispatchResult::Completed));
        assert_eq!(*log.lock(), vec!["once", "watch", "watch"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cooldown_silent_when_disabled() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(
                HandlerSpec::command("roll").cooldown(Duration::from_secs(10)),
                &log,
            ))
            .unwrap();
        let settings = DispatcherSettings {
            reply_on_cooldown: false,
            ..Default::default()
        };
        let (dispatcher, gateway) = setup_with(registry, settings);

        dispatcher.dispatch(in_server("u1", "!roll")).await;
        dispatcher.dispatch(in_server("u1", "!roll")).await;
        assert_eq!(log.lock().len(), 1);
        assert!(gateway.sent().is_empty());
    }

    #[tokio::test]
    async fn test_server_settings_apply() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::command("ping"), &log))
            .unwrap()
            .with(recorder(HandlerSpec::command("set").owner_only(true), &log))
            .unwrap();
        let (dispatcher, gateway) = setup(registry);
        gateway.add_member(
            Member::new(User::new("u1", "alice"), "s1").with_role(Role::new("r1", "Mods")),
        );
        dispatcher
            .server_config()
            .set("s1", PREFIX_KEY, "?")
            .await
            .unwrap();
        dispatcher
            .server_config()
            .set("s1", OWNER_ROLES_KEY, "Admins\nMods")
            .await
            .unwrap();

        dispatcher.dispatch(in_server("u1", "!ping")).await;
        dispatcher.dispatch(in_server("u1", "?ping")).await;
        dispatcher.dispatch(in_server("u1", "?set")).await;
        assert_eq!(*log.lock(), vec!["ping", "set"]);
    }

    #[tokio::test]
    async fn test_server_language_reaches_handler() {
        let langs: Log = Log::default();
        let seen = Arc::clone(&langs);
        let registry = HandlerRegistry::new()
            .with(Arc::new(handler_fn(HandlerSpec::command("lang"), move |ctx| {
                let seen = Arc::clone(&seen);
                async move {
                    seen.lock().push(ctx.lang().to_string());
                    Ok(())
                }
            })))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);
        dispatcher
            .server_config()
            .set("s1", LANG_KEY, "en_US")
            .await
            .unwrap();

        dispatcher.dispatch(in_server("u1", "!lang")).await;
        dispatcher
            .dispatch(message("u1", Channel::private("d1"), "!lang"))
            .await;
        assert_eq!(*langs.lock(), vec!["en_US", "es_CL"]);
    }

    #[tokio::test]
    async fn test_typing_cleared_after_failure() {
        let registry = HandlerRegistry::new()
            .with(Arc::new(handler_fn(HandlerSpec::command("slow"), |ctx| async move {
                ctx.typing().await?;
                ctx.typing().await?;
                anyhow::bail!("gave up")
            })))
            .unwrap();
        let (dispatcher, gateway) = setup(registry);

        dispatcher.dispatch(in_server("u1", "!slow")).await;
        assert_eq!(
            gateway.calls(),
            vec![
                GatewayCall::StartTyping("c1".into()),
                GatewayCall::StopTyping("c1".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_last_author_tracks_non_self_messages() {
        let (dispatcher, _gateway) = setup(HandlerRegistry::new());

        dispatcher.dispatch(in_server("u1", "hi")).await;
        dispatcher.dispatch(in_server("42", "hello")).await;
        assert_eq!(dispatcher.state().last_author().as_deref(), Some("u1"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_events_keep_handler_order() {
        let log: Arc<Mutex<Vec<(String, &'static str)>>> = Arc::default();
        let mut registry = HandlerRegistry::new();
        for name in ["a", "b", "c"] {
            let log = Arc::clone(&log);
            registry
                .register(Arc::new(handler_fn(
                    HandlerSpec::new(name).on_event("message"),
                    move |ctx| {
                        let log = Arc::clone(&log);
                        async move {
                            tokio::task::yield_now().await;
                            log.lock().push((ctx.raw_text().to_string(), name));
                            Ok(())
                        }
                    },
                )))
                .unwrap();
        }
        let (dispatcher, _gateway) = setup(registry);

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let dispatcher = dispatcher.clone();
                tokio::spawn(async move {
                    dispatcher
                        .dispatch(in_server("u1", &format!("e{i}")))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let log = log.lock();
        for i in 0..8 {
            let order: Vec<&str> = log
                .iter()
                .filter(|(text, _)| *text == format!("e{i}"))
                .map(|(_, name)| *name)
                .collect();
            assert_eq!(order, vec!["a", "b", "c"]);
        }
    }

    #[tokio::test]
    async fn test_dispatcher_as_tower_service() {
        let log = Log::default();
        let registry = HandlerRegistry::new()
            .with(recorder(HandlerSpec::new("joined").on_event("member_join"), &log))
            .unwrap();
        let (dispatcher, _gateway) = setup(registry);

        let event = Event::MemberJoined(Member::new(User::new("u9", "newbie"), "s1"));
        let report = tokio_test::assert_ok!(dispatcher.oneshot(event).await);
        assert_eq!(report.event, "member_join");
        assert_eq!(report.ran(), vec!["joined"]);
    }
}
