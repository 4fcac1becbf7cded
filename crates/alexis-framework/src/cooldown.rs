//! Per-handler, per-caller cooldowns.
//!
//! The tracker stores, for each `(handler, caller)` pair, the instant after
//! which the caller may use the handler again, or no instant at all when the
//! cooldown reaches past what the clock can represent. Checking and consuming happen
//! under one lock, so two near-simultaneous invocations cannot both pass.
//!
//! Time comes from `tokio::time::Instant`, which is monotonic and can be
//! paused and advanced in tests.

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::trace;

/// Outcome of [`CooldownTracker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CooldownDecision {
    Allow,
    Deny {
        /// Time left before the caller may use the handler again.
        remaining: Duration,
    },
}

impl CooldownDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Remaining whole seconds, rounded up, as shown to users.
pub fn remaining_secs(remaining: Duration) -> u64 {
    let secs = remaining.as_secs();
    if remaining.subsec_nanos() > 0 {
        secs.saturating_add(1)
    } else {
        secs
    }
}

/// Process-wide cooldown state.
#[derive(Debug, Default)]
pub struct CooldownTracker {
    usable_after: Mutex<HashMap<(String, String), Option<Instant>>>,
}

impl CooldownTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks the cooldown of `handler` for `caller` and consumes it on success.
    ///
    /// A zero `cooldown` always allows and records nothing.
    pub fn check(&self, handler: &str, caller: &str, cooldown: Duration) -> CooldownDecision {
        if cooldown.is_zero() {
            return CooldownDecision::Allow;
        }

        let now = Instant::now();
        let mut entries = self.usable_after.lock();
        let key = (handler.to_string(), caller.to_string());

        if let Some(&usable_after) = entries.get(&key) {
            let remaining = match usable_after {
                Some(usable_after) if usable_after > now => usable_after - now,
                Some(_) => Duration::ZERO,
                None => Duration::MAX,
            };
            if !remaining.is_zero() {
                trace!(handler, caller, ?remaining, "Cooldown active");
                return CooldownDecision::Deny { remaining };
            }
        }

        entries.insert(key, now.checked_add(cooldown));
        CooldownDecision::Allow
    }

    /// Number of tracked `(handler, caller)` pairs.
    pub fn len(&self) -> usize {
        self.usable_after.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.usable_after.lock().is_empty()
    }
}
