//! Active-conversation tracking.
//!
//! At most one conversation is presented to the user at a time; only that
//! one is exempt from unread accumulation. The chosen id is persisted by
//! the caller (durable client-side storage) and restored by calling
//! `activate` again at startup — nothing here touches disk.

use tally_shared::types::UserId;

/// Tracks which conversation is currently viewed.
#[derive(Debug, Clone, Default)]
pub struct ActiveConversation {
    current: Option<UserId>,
}

impl ActiveConversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `id` the active conversation, superseding any previous one.
    /// There is no history or stack.
    pub fn activate(&mut self, id: UserId) {
        self.current = Some(id);
    }

    /// Return to the no-conversation-active state (e.g. on logout).
    pub fn deactivate(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<UserId> {
        self.current
    }

    pub fn is_active(&self, id: UserId) -> bool {
        self.current == Some(id)
    }
}
