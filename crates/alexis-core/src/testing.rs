//! Test doubles for the gateway collaborator.
//!
//! Compiled for this crate's tests and, through the `testing` feature, for
//! the tests of downstream crates.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{GatewayError, GatewayResult};
use crate::event::Member;
use crate::gateway::{Gateway, OutboundMessage, SentMessage};

/// A gateway operation observed by [`RecordingGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Send(OutboundMessage),
    Delete { channel_id: String, message_id: String },
    StartTyping(String),
    StopTyping(String),
    Presence(String),
}

/// A [`Gateway`] that records every call and never touches the network.
#[derive(Debug)]
pub struct RecordingGateway {
    self_id: String,
    calls: Mutex<Vec<GatewayCall>>,
    members: Mutex<HashMap<(String, String), Member>>,
    next_id: AtomicU64,
    forbid_sends: AtomicBool,
    forbid_deletes: AtomicBool,
}

impl RecordingGateway {
    pub fn new(self_id: impl Into<String>) -> Self {
        Self {
            self_id: self_id.into(),
            calls: Mutex::new(Vec::new()),
            members: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            forbid_sends: AtomicBool::new(false),
            forbid_deletes: AtomicBool::new(false),
        }
    }

    /// Makes a member resolvable through [`Gateway::member`].
    pub fn add_member(&self, member: Member) {
        self.members
            .lock()
            .insert((member.server_id.clone(), member.user.id.clone()), member);
    }

    /// Makes every subsequent send fail with [`GatewayError::Forbidden`].
    pub fn forbid_sends(&self, forbid: bool) {
        self.forbid_sends.store(forbid, Ordering::SeqCst);
    }

    /// Makes every subsequent delete fail with [`GatewayError::Forbidden`].
    pub fn forbid_deletes(&self, forbid: bool) {
        self.forbid_deletes.store(forbid, Ordering::SeqCst);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.calls.lock().clone()
    }

    /// Messages that were sent, in order.
    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                GatewayCall::Send(message) => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    /// Text content of the sent messages, in order.
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter_map(|message| message.content)
            .collect()
    }

    pub fn clear(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: GatewayCall) {
        self.calls.lock().push(call);
    }
}

#[async_trait]
impl Gateway for RecordingGateway {
    fn self_id(&self) -> &str {
        &self.self_id
    }

    async fn send(&self, message: OutboundMessage) -> GatewayResult<SentMessage> {
        if self.forbid_sends.load(Ordering::SeqCst) {
            return Err(GatewayError::Forbidden("send_messages".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let channel_id = message.channel_id.clone();
        self.record(GatewayCall::Send(message));
        Ok(SentMessage {
            id: format!("sent-{id}"),
            channel_id,
        })
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> GatewayResult<()> {
        if self.forbid_deletes.load(Ordering::SeqCst) {
            return Err(GatewayError::Forbidden("manage_messages".into()));
        }
        self.record(GatewayCall::Delete {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }

    async fn start_typing(&self, channel_id: &str) -> GatewayResult<()> {
        self.record(GatewayCall::StartTyping(channel_id.to_string()));
        Ok(())
    }

    async fn stop_typing(&self, channel_id: &str) -> GatewayResult<()> {
        self.record(GatewayCall::StopTyping(channel_id.to_string()));
        Ok(())
    }

    async fn member(&self, server_id: &str, user_id: &str) -> GatewayResult<Option<Member>> {
        Ok(self
            .members
            .lock()
            .get(&(server_id.to_string(), user_id.to_string()))
            .cloned())
    }

    async fn set_presence(&self, status: &str) -> GatewayResult<()> {
        self.record(GatewayCall::Presence(status.to_string()));
        Ok(())
    }
}
