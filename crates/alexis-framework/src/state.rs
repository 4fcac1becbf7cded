//! Engine-wide mutable state shared by every handler.

use parking_lot::RwLock;

/// Small pieces of state the engine tracks across events.
#[derive(Debug, Default)]
pub struct SharedState {
    last_author: RwLock<Option<String>>,
}

impl SharedState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id of the author of the most recent message not sent by the bot.
    pub fn last_author(&self) -> Option<String> {
        self.last_author.read().clone()
    }

    pub(crate) fn set_last_author(&self, author_id: &str) {
        *self.last_author.write() = Some(author_id.to_string());
    }
}
