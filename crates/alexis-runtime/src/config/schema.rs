//! Configuration schema definitions.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use alexis_framework::DispatcherSettings;
use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlexisConfig {
    /// Engine behaviour shared by every server.
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Event loop and shutdown behaviour.
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

// =============================================================================
// Bot
// =============================================================================

/// The `[bot]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotConfig {
    /// Prefix used when a server has not configured its own.
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Owner-role list used when a server has not configured its own.
    #[serde(default = "default_owner_roles")]
    pub owner_roles: Vec<String>,

    /// User ids allowed to run bot-owner-only commands.
    #[serde(default)]
    pub bot_owners: Vec<String>,

    /// Language used when a server has not chosen one.
    #[serde(default = "default_lang")]
    pub default_lang: String,

    /// Answer rate-limited commands with the cooldown text.
    #[serde(default = "default_true")]
    pub reply_on_cooldown: bool,

    /// Reply sent when a handler fails. Failures are silent when unset.
    #[serde(default)]
    pub fault_reply: Option<String>,

    /// Seconds between two presence updates of the status rotation.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            command_prefix: default_command_prefix(),
            owner_roles: default_owner_roles(),
            bot_owners: Vec::new(),
            default_lang: default_lang(),
            reply_on_cooldown: true,
            fault_reply: None,
            status_interval_secs: default_status_interval_secs(),
        }
    }
}

impl BotConfig {
    /// Settings for the dispatcher.
    pub fn dispatcher_settings(&self) -> DispatcherSettings {
        DispatcherSettings {
            command_prefix: self.command_prefix.clone(),
            bot_owners: self.bot_owners.clone(),
            owner_roles: self.owner_roles.clone(),
            default_lang: self.default_lang.clone(),
            reply_on_cooldown: self.reply_on_cooldown,
            fault_reply: self.fault_reply.clone(),
        }
    }

    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs)
    }
}

fn default_command_prefix() -> String {
    "!".to_string()
}

fn default_owner_roles() -> Vec<String> {
    vec!["Owner".to_string()]
}

fn default_lang() -> String {
    "es_CL".to_string()
}

fn default_true() -> bool {
    true
}

fn default_status_interval_secs() -> u64 {
    30
}

// =============================================================================
// Runtime
// =============================================================================

/// The `[runtime]` section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// How long in-flight dispatches may run after shutdown is requested.
    #[serde(default = "default_shutdown_grace_secs")]
    pub shutdown_grace_secs: u64,

    /// Capacity of the inbound event channel.
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            shutdown_grace_secs: default_shutdown_grace_secs(),
            event_buffer: default_event_buffer(),
        }
    }
}

impl RuntimeConfig {
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_secs(self.shutdown_grace_secs)
    }
}

fn default_shutdown_grace_secs() -> u64 {
    10
}

fn default_event_buffer() -> usize {
    256
}

// =============================================================================
// Logging
// =============================================================================

/// Log verbosity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature; falls back to `full` without it.
    Json,
}

/// Where log lines go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// When the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub close: bool,
}

/// The `[logging]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file and line of the log call.
    #[serde(default)]
    pub file_location: bool,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    /// Rotated files kept on disk.
    #[serde(default = "default_max_files")]
    pub max_files: usize,

    /// Per-target levels, e.g. `alexis_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            format: LogFormat::default(),
            output: LogOutput::default(),
            span_events: SpanEventConfig::default(),
            thread_ids: false,
            file_location: false,
            file_path: None,
            rotation: LogRotation::default(),
            max_files: default_max_files(),
            filters: HashMap::new(),
        }
    }
}

fn default_max_files() -> usize {
    5
}
