//! Rotating bot presence.
//!
//! The status cycles through a list every `status_interval`. Bot owners can
//! replace the list with `setstatus a | b | c`; `setstatus` alone restores
//! the built-in one.

use std::sync::Arc;
use std::time::Duration;

use alexis_framework::{CommandContext, Handler, HandlerResult, HandlerSpec, Messenger};
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// One entry of the built-in status list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEntry {
    Text(String),
    /// Time since the rotation was created.
    Uptime,
}

#[derive(Debug, Default)]
struct Rotation {
    custom: Vec<String>,
    index: usize,
    last: String,
}

/// The `setstatus` command and the scheduled presence update.
pub struct StatusRotation {
    spec: HandlerSpec,
    interval: Duration,
    defaults: Vec<StatusEntry>,
    started: Instant,
    rotation: Mutex<Rotation>,
}

impl StatusRotation {
    /// Rotation over the built-in list, advancing every `interval`.
    pub fn new(prefix: &str, interval: Duration) -> Self {
        Self::with_defaults(
            vec![
                StatusEntry::Text(format!("version {}", env!("CARGO_PKG_VERSION"))),
                StatusEntry::Text(format!("{prefix}help = commands")),
                StatusEntry::Uptime,
            ],
            interval,
        )
    }

    /// Rotation over `defaults`. An empty list keeps the presence untouched.
    pub fn with_defaults(defaults: Vec<StatusEntry>, interval: Duration) -> Self {
        Self {
            spec: HandlerSpec::command("setstatus").bot_owner_only(true),
            interval,
            defaults,
            started: Instant::now(),
            rotation: Mutex::new(Rotation::default()),
        }
    }

    /// The statuses set by `setstatus`, empty when the built-in list is used.
    pub fn custom_statuses(&self) -> Vec<String> {
        self.rotation.lock().custom.clone()
    }

    fn render(&self, entry: &StatusEntry) -> String {
        match entry {
            StatusEntry::Text(text) => text.clone(),
            StatusEntry::Uptime => format!("up for {}", format_uptime(self.started.elapsed())),
        }
    }

    /// Next status of the rotation, or `None` when it equals the current one.
    fn next_status(&self) -> Option<String> {
        let mut rotation = self.rotation.lock();
        let len = if rotation.custom.is_empty() {
            self.defaults.len()
        } else {
            rotation.custom.len()
        };
        if len == 0 {
            return None;
        }
        if rotation.index >= len {
            rotation.index = 0;
        }

        let status = match rotation.custom.get(rotation.index) {
            Some(custom) => custom.clone(),
            None => self.render(&self.defaults[rotation.index]),
        };
        rotation.index += 1;

        if status == rotation.last {
            return None;
        }
        rotation.last = status.clone();
        Some(status)
    }

    async fn advance(&self, messenger: &Messenger) -> HandlerResult {
        if let Some(status) = self.next_status() {
            debug!(status = %status, "Changing status");
            messenger.set_presence(&status).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Handler for StatusRotation {
    fn spec(&self) -> &HandlerSpec {
        &self.spec
    }

    async fn handle(&self, ctx: Arc<CommandContext>) -> HandlerResult {
        let custom: Vec<String> = ctx
            .text()
            .split('|')
            .map(str::trim)
            .filter(|status| !status.is_empty())
            .map(str::to_string)
            .collect();
        let reset = custom.is_empty();
        {
            let mut rotation = self.rotation.lock();
            rotation.custom = custom;
            rotation.index = 0;
        }

        self.advance(ctx.messenger()).await?;
        ctx.answer(if reset {
            "status list restored"
        } else {
            "status list updated"
        })
        .await?;
        Ok(())
    }

    fn interval(&self) -> Option<Duration> {
        Some(self.interval)
    }

    async fn tick(&self, messenger: &Messenger) -> HandlerResult {
        self.advance(messenger).await
    }
}

/// `3d 4h 5m`, leading zero units omitted; seconds only under a minute.
fn format_uptime(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let (days, hours, minutes) = (secs / 86_400, secs / 3_600 % 24, secs / 60 % 60);
    if days > 0 {
        format!("{days}d {hours}h {minutes}m")
    } else if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m")
    } else {
        format!("{secs}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alexis_core::testing::{GatewayCall, RecordingGateway};
    use alexis_core::{Channel, Event, Message, User};
    use alexis_framework::{
        Denial, DispatchResult, Dispatcher, DispatcherBuilder, DispatcherSettings,
        HandlerRegistry,
    };

    fn setup(rotation: Arc<StatusRotation>) -> (Dispatcher, Arc<RecordingGateway>) {
        let gateway = Arc::new(RecordingGateway::new("42"));
        let mut registry = HandlerRegistry::new();
        registry.register(rotation).unwrap();
        let dispatcher = DispatcherBuilder::new(registry, gateway.clone())
            .settings(DispatcherSettings {
                bot_owners: vec!["1".into()],
                ..Default::default()
            })
            .build();
        (dispatcher, gateway)
    }

    fn from(author: &str, content: &str) -> Event {
        Event::MessageCreated(Message::new(
            "m1",
            Channel::server("c1", "s1"),
            User::new(author, "someone"),
            content,
        ))
    }

    fn presences(gateway: &RecordingGateway) -> Vec<String> {
        gateway
            .calls()
            .into_iter()
            .filter_map(|call| match call {
                GatewayCall::Presence(status) => Some(status),
                _ => None,
            })
            .collect()
    }

    fn texts(entries: &[&str]) -> Vec<StatusEntry> {
        entries
            .iter()
            .map(|text| StatusEntry::Text(text.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_setstatus_replaces_list_and_pushes_first() {
        let rotation = Arc::new(StatusRotation::with_defaults(
            texts(&["one", "two"]),
            Duration::from_secs(30),
        ));
        let (dispatcher, gateway) = setup(Arc::clone(&rotation));

        dispatcher.dispatch(from("1", "!setstatus a | b ||")).await;
        assert_eq!(rotation.custom_statuses(), vec!["a", "b"]);
        assert_eq!(presences(&gateway), vec!["a"]);
        assert_eq!(gateway.sent_texts(), vec!["status list updated"]);

        rotation.tick(dispatcher.messenger()).await.unwrap();
        rotation.tick(dispatcher.messenger()).await.unwrap();
        assert_eq!(presences(&gateway), vec!["a", "b", "a"]);
    }

    #[tokio::test]
    async fn test_empty_setstatus_restores_defaults() {
        let rotation = Arc::new(StatusRotation::with_defaults(
            texts(&["one", "two"]),
            Duration::from_secs(30),
        ));
        let (dispatcher, gateway) = setup(Arc::clone(&rotation));

        dispatcher.dispatch(from("1", "!setstatus custom")).await;
        dispatcher.dispatch(from("1", "!setstatus")).await;

        assert!(rotation.custom_statuses().is_empty());
        assert_eq!(presences(&gateway), vec!["custom", "one"]);
        assert_eq!(
            gateway.sent_texts(),
            vec!["status list updated", "status list restored"]
        );
    }

    #[tokio::test]
    async fn test_unchanged_status_is_not_pushed() {
        let rotation = Arc::new(StatusRotation::with_defaults(
            texts(&["only"]),
            Duration::from_secs(30),
        ));
        let (dispatcher, gateway) = setup(Arc::clone(&rotation));

        rotation.tick(dispatcher.messenger()).await.unwrap();
        rotation.tick(dispatcher.messenger()).await.unwrap();
        assert_eq!(presences(&gateway), vec!["only"]);
    }

    #[tokio::test]
    async fn test_only_bot_owners_may_set_status() {
        let rotation = Arc::new(StatusRotation::new("!", Duration::from_secs(30)));
        let (dispatcher, gateway) = setup(Arc::clone(&rotation));

        let report = dispatcher.dispatch(from("2", "!setstatus hacked")).await;
        assert_eq!(
            report.outcome("setstatus"),
            Some(&DispatchResult::Denied(Denial::OwnerOnly))
        );
        assert!(rotation.custom_statuses().is_empty());
        assert!(presences(&gateway).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_builtin_list_includes_uptime() {
        let rotation = StatusRotation::new("?", Duration::from_secs(30));
        tokio::time::advance(Duration::from_secs(3_720)).await;

        let statuses: Vec<_> = (0..3).filter_map(|_| rotation.next_status()).collect();
        assert_eq!(statuses[1], "?help = commands");
        assert_eq!(statuses[2], "up for 1h 2m");
        assert_eq!(rotation.interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_format_uptime() {
        assert_eq!(format_uptime(Duration::from_secs(42)), "42s");
        assert_eq!(format_uptime(Duration::from_secs(125)), "2m");
        assert_eq!(format_uptime(Duration::from_secs(90_061)), "1d 1h 1m");
    }
}
