//! Event loop and lifecycle of a running bot.
//!
//! The runtime owns one [`Dispatcher`] and feeds it the events delivered by
//! the gateway through an mpsc channel. Every event is dispatched on its own
//! task, so a slow handler never holds back unrelated events. Handlers that
//! declare an [`interval`](alexis_framework::Handler::interval) get their
//! `tick` driven here as well.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use alexis_runtime::BotRuntime;
//!
//! let runtime = BotRuntime::builder()
//!     .profile("production")
//!     .gateway(gateway)
//!     .handler(ping)
//!     .build()?;
//!
//! let (events_tx, events) = runtime.event_channel();
//! // hand `events_tx` to the gateway connection
//! runtime.run(events).await?;
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::Arc;

use alexis_core::{BoxedGateway, BoxedServerConfig, BoxedStore, Event};
use alexis_framework::{
    BoxedHandler, BoxedPreSendHook, DispatchReport, DispatchResult, Dispatcher,
    DispatcherBuilder, HandlerRegistry,
};
use futures::FutureExt;
use tokio::signal;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::config::{AlexisConfig, ConfigLoader, validate_config};
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;

/// Counters collected while the runtime was running.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub events_received: u64,
    /// Events whose dispatch ran to the end.
    pub dispatches_completed: u64,
    /// Events whose dispatch was cut off at shutdown.
    pub dispatches_aborted: u64,
    /// Handler bodies that returned an error or panicked.
    pub handler_failures: u64,
}

impl RuntimeStats {
    fn record(&mut self, joined: Result<DispatchReport, JoinError>) {
        match joined {
            Ok(report) => {
                self.dispatches_completed += 1;
                self.handler_failures += report
                    .outcomes
                    .iter()
                    .filter(|outcome| matches!(outcome.result, DispatchResult::Failed(_)))
                    .count() as u64;
            }
            Err(e) if e.is_cancelled() => self.dispatches_aborted += 1,
            Err(e) => {
                error!(error = %e, "Dispatch task died");
                self.dispatches_aborted += 1;
            }
        }
    }
}

/// A configured bot, ready to consume events.
pub struct BotRuntime {
    config: AlexisConfig,
    dispatcher: Dispatcher,
}

impl BotRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    pub fn config(&self) -> &AlexisConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// A channel sized after `runtime.event_buffer`.
    pub fn event_channel(&self) -> (mpsc::Sender<Event>, mpsc::Receiver<Event>) {
        mpsc::channel(self.config.runtime.event_buffer)
    }

    /// Runs until Ctrl+C, SIGTERM or the end of the event stream.
    pub async fn run(&self, events: mpsc::Receiver<Event>) -> RuntimeResult<RuntimeStats> {
        info!("Alexis is now running. Press Ctrl+C to stop.");
        self.run_until(events, wait_for_shutdown()).await
    }

    /// Runs until `shutdown` resolves or the event stream ends.
    ///
    /// Dispatches still in flight afterwards get `runtime.shutdown_grace`
    /// to finish and are aborted past it.
    pub async fn run_until<F>(
        &self,
        mut events: mpsc::Receiver<Event>,
        shutdown: F,
    ) -> RuntimeResult<RuntimeStats>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let schedules = CancellationToken::new();
        let mut scheduled = self.spawn_schedules(&schedules);
        let mut in_flight: JoinSet<DispatchReport> = JoinSet::new();
        let mut stats = RuntimeStats::default();

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => {
                        stats.events_received += 1;
                        trace!(event = event.name(), "Event received");
                        let dispatcher = self.dispatcher.clone();
                        in_flight.spawn(async move { dispatcher.dispatch(event).await });
                    }
                    None => {
                        info!("Event stream closed");
                        break;
                    }
                },
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    stats.record(joined);
                }
            }
        }

        schedules.cancel();
        scheduled.shutdown().await;

        let grace = self.config.runtime.shutdown_grace();
        debug!(pending = in_flight.len(), ?grace, "Draining in-flight dispatches");
        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = in_flight.join_next().await {
                stats.record(joined);
            }
        })
        .await;

        if drained.is_err() {
            warn!(
                pending = in_flight.len(),
                "Shutdown grace elapsed, aborting remaining dispatches"
            );
            in_flight.abort_all();
            while let Some(joined) = in_flight.join_next().await {
                stats.record(joined);
            }
        }

        info!(
            events = stats.events_received,
            completed = stats.dispatches_completed,
            aborted = stats.dispatches_aborted,
            failures = stats.handler_failures,
            "Runtime stopped"
        );
        Ok(stats)
    }

    /// One task per handler with an interval, ticking until `token` fires.
    fn spawn_schedules(&self, token: &CancellationToken) -> JoinSet<()> {
        let mut set = JoinSet::new();
        for handler in self.dispatcher.registry().handlers() {
            let Some(period) = handler.interval() else {
                continue;
            };
            if period.is_zero() {
                warn!(handler = handler.spec().name(), "Ignoring zero tick interval");
                continue;
            }

            let handler = Arc::clone(handler);
            let messenger = Arc::clone(self.dispatcher.messenger());
            let token = token.clone();
            debug!(handler = handler.spec().name(), ?period, "Scheduling handler");

            set.spawn(async move {
                let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = ticker.tick() => {}
                    }

                    let name = handler.spec().name();
                    match AssertUnwindSafe(handler.tick(&messenger)).catch_unwind().await {
                        Ok(Ok(())) => trace!(handler = name, "Tick done"),
                        Ok(Err(e)) => error!(handler = name, error = %e, "Tick failed"),
                        Err(_) => error!(handler = name, "Tick panicked"),
                    }
                }
            });
        }
        set
    }
}

impl std::fmt::Debug for BotRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BotRuntime")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Waits for Ctrl+C, or SIGTERM on unix.
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
                return;
            }
            Err(e) => warn!(error = %e, "Failed to register SIGTERM handler"),
        }
    }

    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => error!(error = %e, "Failed to listen for Ctrl+C, shutting down"),
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for a [`BotRuntime`].
///
/// Configuration is loaded through a [`ConfigLoader`] unless a ready
/// [`AlexisConfig`] is supplied with [`config`](Self::config).
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<AlexisConfig>,
    registry: HandlerRegistry,
    handlers: Vec<BoxedHandler>,
    gateway: Option<BoxedGateway>,
    records: Option<BoxedStore>,
    server_config: Option<BoxedServerConfig>,
    hooks: Vec<BoxedPreSendHook>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            registry: HandlerRegistry::new(),
            handlers: Vec::new(),
            gateway: None,
            records: None,
            server_config: None,
            hooks: Vec::new(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges configuration on top of the built-in defaults.
    pub fn merge(mut self, config: AlexisConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is; no file or environment is read.
    pub fn config(mut self, config: AlexisConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Starts from an already populated registry.
    pub fn registry(mut self, registry: HandlerRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Adds a handler, registered when the runtime is built.
    pub fn handler(mut self, handler: BoxedHandler) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn gateway(mut self, gateway: BoxedGateway) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn records(mut self, records: BoxedStore) -> Self {
        self.records = Some(records);
        self
    }

    pub fn server_config(mut self, server_config: BoxedServerConfig) -> Self {
        self.server_config = Some(server_config);
        self
    }

    pub fn pre_send_hook(mut self, hook: BoxedPreSendHook) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Whether `build` installs the global subscriber (default `true`).
    pub fn init_logging(mut self, init: bool) -> Self {
        self.init_logging = init;
        self
    }

    /// Loads and validates the configuration, then assembles the dispatcher.
    pub fn build(self) -> RuntimeResult<BotRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging)?;
        }

        let gateway = self.gateway.ok_or(RuntimeError::MissingGateway)?;
        let mut registry = self.registry;
        for handler in self.handlers {
            registry.register(handler)?;
        }

        let mut builder =
            DispatcherBuilder::new(registry, gateway).settings(config.bot.dispatcher_settings());
        if let Some(records) = self.records {
            builder = builder.records(records);
        }
        if let Some(server_config) = self.server_config {
            builder = builder.server_config(server_config);
        }
        for hook in self.hooks {
            builder = builder.pre_send_hook(hook);
        }
        let dispatcher = builder.build();

        info!(
            handlers = dispatcher.registry().len(),
            prefix = %config.bot.command_prefix,
            log_level = %config.logging.level,
            "Runtime initialized"
        );

        Ok(BotRuntime { config, dispatcher })
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
