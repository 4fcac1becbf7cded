//! Gate evaluation.
//!
//! [`evaluate`] decides whether a handler may run for an invocation. It is a
//! pure function of the handler's [`HandlerSpec`] and the [`GateSubject`]:
//! everything it needs (caller, membership, owner lists) is resolved by the
//! dispatcher beforehand.
//!
//! Checks run in a fixed order and the first failing one decides:
//!
//! 1. private context on a handler that refuses it → [`Denial::NoPrivateMessage`]
//! 2. bot-owner-only handler, caller not a bot owner → [`Denial::OwnerOnly`]
//! 3. owner-only handler, caller not a server owner → [`Denial::OwnerOnly`]
//! 4. self-originated event on a handler that did not opt in → [`Denial::Ignored`]

use alexis_core::Member;

use crate::handler::HandlerSpec;

/// Why a gate refused a handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denial {
    /// The handler does not run in private conversations.
    NoPrivateMessage,
    /// The caller lacks owner rights.
    OwnerOnly,
    /// The event was produced by the bot itself. Never answered.
    Ignored,
}

impl Denial {
    /// Whether the denial is answered with a chat reply.
    pub fn is_visible(self) -> bool {
        !matches!(self, Self::Ignored)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::NoPrivateMessage => "no_private_message",
            Self::OwnerOnly => "owner_only",
            Self::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of [`evaluate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Deny(Denial),
}

impl GateDecision {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// The invocation facts a gate looks at.
#[derive(Debug, Clone, Copy)]
pub struct GateSubject<'a> {
    pub is_private: bool,
    pub is_self: bool,
    /// Caller id, if the event has a caller.
    pub caller_id: Option<&'a str>,
    /// Caller's membership in the event's server.
    pub member: Option<&'a Member>,
    /// Configured bot owners.
    pub bot_owners: &'a [String],
    /// The server's owner-role list (role ids, role names or member ids).
    pub owner_roles: &'a [String],
}

/// Decides whether `spec` may run for `subject`.
pub fn evaluate(spec: &HandlerSpec, subject: &GateSubject<'_>) -> GateDecision {
    if subject.is_private && !spec.allows_private() {
        return GateDecision::Deny(Denial::NoPrivateMessage);
    }

    if spec.is_bot_owner_only() && !is_bot_owner(subject.caller_id, subject.bot_owners) {
        return GateDecision::Deny(Denial::OwnerOnly);
    }

    if spec.is_owner_only() && !is_server_owner(subject.member, subject.owner_roles) {
        return GateDecision::Deny(Denial::OwnerOnly);
    }

    if subject.is_self && !spec.accepts_self() {
        return GateDecision::Deny(Denial::Ignored);
    }

    GateDecision::Allow
}

/// Returns `true` if `caller_id` is one of the configured bot owners.
pub fn is_bot_owner(caller_id: Option<&str>, bot_owners: &[String]) -> bool {
    caller_id.is_some_and(|id| bot_owners.iter().any(|owner| owner == id))
}

/// Returns `true` if the member may use owner-only handlers in its server.
///
/// Administrators always pass. Otherwise the member passes when its id, or
/// the id or name of one of its roles, appears in `owner_roles`.
pub fn is_server_owner(member: Option<&Member>, owner_roles: &[String]) -> bool {
    let Some(member) = member else {
        return false;
    };
    if member.administrator {
        return true;
    }
    owner_roles
        .iter()
        .any(|entry| entry == member.id() || member.has_role(entry))
}

/// Splits a stored owner-role list (one entry per line) into entries.
pub fn parse_owner_roles(value: &str) -> Vec<String> {
    value
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
