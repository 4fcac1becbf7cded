//! # Alexis Framework
//!
//! The event dispatch and command-routing engine of the Alexis chat bot.
//!
//! This layer provides:
//! - [`HandlerSpec`] and the [`Handler`] trait: what triggers a handler and
//!   which gates apply to it
//! - [`HandlerRegistry`]: name-unique handler storage indexed by trigger class
//! - Command parsing ([`parser`]), gate evaluation ([`gate`]) and per-caller
//!   cooldowns ([`cooldown`])
//! - [`Dispatcher`]: routes each event to its candidates, isolates faults
//! - [`CommandContext`] and [`Messenger`]: how handlers answer
//!
//! Handlers are plain trait objects; nothing here knows about concrete
//! plugins.

pub mod context;
pub mod cooldown;
pub mod dispatcher;
pub mod error;
pub mod gate;
pub mod handler;
pub mod messenger;
pub mod parser;
pub mod registry;
pub mod state;

pub use context::{CommandContext, Invocation};
pub use cooldown::{CooldownDecision, CooldownTracker};
pub use dispatcher::{
    DispatchReport, DispatchResult, Dispatcher, DispatcherBuilder, DispatcherSettings,
    HandlerOutcome, LANG_KEY, OWNER_ROLES_KEY, PREFIX_KEY,
};
pub use error::{HandlerResult, RegistryError, RegistryResult};
pub use gate::{Denial, GateDecision, GateSubject};
pub use handler::{BoxedHandler, DenialTexts, FnHandler, Handler, HandlerSpec, handler_fn};
pub use messenger::{BoxedPreSendHook, Messenger, PreSendHook};
pub use parser::ParsedCommand;
pub use registry::HandlerRegistry;
pub use state::SharedState;
