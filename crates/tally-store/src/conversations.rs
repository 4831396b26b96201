//! The conversation aggregate.
//!
//! Maintains the in-memory map of all conversations, keyed by counterpart
//! user id. This is the only place conversation state is mutated; the
//! transport, the REST layer and the UI all go through these methods.

use std::collections::HashMap;

use tracing::debug;

use tally_shared::protocol::InboundMessage;
use tally_shared::types::{DeliveryStatus, UserId};

use crate::models::{
    Conversation, ConversationDebt, DebtRecord, Message, Task, User, WhoOwes,
};

/// All conversations of the local user.
#[derive(Debug, Clone, Default)]
pub struct ConversationStore {
    conversations: HashMap<UserId, Conversation>,
    /// Whether a history fetch is currently in flight.
    loading_history: bool,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Hydration
    // -----------------------------------------------------------------------

    /// Replace the conversation map from a freshly fetched participant list.
    ///
    /// One empty conversation per counterpart; the local user is skipped.
    /// This is a full replace: hydration does not merge into prior state.
    pub fn hydrate(&mut self, local_user: UserId, users: Vec<User>) -> usize {
        self.conversations = users
            .into_iter()
            .filter(|u| u.id != local_user)
            .map(|u| (u.id, Conversation::new(u)))
            .collect();
        debug!(count = self.conversations.len(), "Hydrated conversations");
        self.conversations.len()
    }

    // -----------------------------------------------------------------------
    // Messages
    // -----------------------------------------------------------------------

    /// Append the optimistic copy of an outbound message.
    ///
    /// Happens before any transmit attempt, so the sender always sees their
    /// own message immediately. Returns the appended message, or `None` if
    /// the conversation is unknown.
    pub fn append_outbound(
        &mut self,
        local_user: UserId,
        conversation_id: UserId,
        content: &str,
    ) -> Option<Message> {
        let conversation = self.conversations.get_mut(&conversation_id)?;
        let message = Message::outbound(local_user, conversation_id, content);
        conversation.append(message.clone());
        debug!(conversation = %conversation_id, id = %message.id, "Appended optimistic message");
        Some(message)
    }

    /// Apply a non-echo inbound message.
    ///
    /// Appends, moves the last-message pointer, and increments unread by
    /// exactly one unless the owning conversation is the active one.
    /// Returns `false` when the conversation is unknown.
    pub fn apply_inbound(
        &mut self,
        conversation_id: UserId,
        message: Message,
        active: Option<UserId>,
    ) -> bool {
        let Some(conversation) = self.conversations.get_mut(&conversation_id) else {
            debug!(conversation = %conversation_id, "Dropping inbound for unknown conversation");
            return false;
        };

        conversation.append(message);
        if active != Some(conversation_id) {
            conversation.unread += 1;
        }
        true
    }

    // -----------------------------------------------------------------------
    // History loading
    // -----------------------------------------------------------------------

    /// Mark a history fetch as started and return its generation token.
    ///
    /// `None` when the conversation is unknown. The token must be passed
    /// back to [`finish_history_load`]; a newer `begin_history_load` for
    /// the same conversation invalidates it.
    pub fn begin_history_load(&mut self, conversation_id: UserId) -> Option<u64> {
        let conversation = self.conversations.get_mut(&conversation_id)?;
        conversation.history_generation += 1;
        self.loading_history = true;
        Some(conversation.history_generation)
    }

    /// Complete a history fetch.
    ///
    /// The loading flag is cleared whether the fetch succeeded or not.
    /// `messages` (oldest first) replaces the conversation's list only if
    /// `generation` is still current — a late response for a superseded
    /// fetch is discarded. Returns whether the replace was applied.
    pub fn finish_history_load(
        &mut self,
        conversation_id: UserId,
        generation: u64,
        messages: Option<Vec<Message>>,
    ) -> bool {
        self.loading_history = false;

        let Some(conversation) = self.conversations.get_mut(&conversation_id) else {
            return false;
        };
        if conversation.history_generation != generation {
            debug!(
                conversation = %conversation_id,
                stale = generation,
                current = conversation.history_generation,
                "Discarding stale history response"
            );
            return false;
        }
        let Some(messages) = messages else {
            return false;
        };

        conversation.replace_history(messages);
        true
    }

    /// Whether a history fetch is currently in flight.
    pub fn is_loading_history(&self) -> bool {
        self.loading_history
    }

    // -----------------------------------------------------------------------
    // Unread
    // -----------------------------------------------------------------------

    /// Zero a conversation's unread counter (activation side effect).
    pub fn clear_unread(&mut self, conversation_id: UserId) {
        if let Some(conversation) = self.conversations.get_mut(&conversation_id) {
            conversation.unread = 0;
        }
    }

    pub fn unread(&self, conversation_id: UserId) -> u32 {
        self.conversations
            .get(&conversation_id)
            .map(|c| c.unread)
            .unwrap_or(0)
    }

    // -----------------------------------------------------------------------
    // Side-channel caches
    // -----------------------------------------------------------------------

    /// Re-partition a freshly fetched task list into each conversation's
    /// cache: a task belongs to the conversation of its creator or
    /// assignee.
    pub fn set_tasks(&mut self, tasks: Vec<Task>) {
        for conversation in self.conversations.values_mut() {
            let id = conversation.id();
            conversation.tasks = tasks
                .iter()
                .filter(|t| t.created_by == id || t.assigned_to == id)
                .cloned()
                .collect();
        }
    }

    /// Project freshly fetched debt records into each conversation's cache,
    /// newest first. Direction is resolved against the local user.
    pub fn set_debts(&mut self, local_user: UserId, debts: Vec<DebtRecord>) {
        for conversation in self.conversations.values_mut() {
            let id = conversation.id();
            let username = conversation.user.username.clone();
            let mut projected: Vec<ConversationDebt> = debts
                .iter()
                .filter(|d| d.debtor_id == id || d.creditor_id == id)
                .map(|d| {
                    let me_debtor = d.debtor_id == local_user;
                    ConversationDebt {
                        id: d.id,
                        who_owes: if me_debtor { WhoOwes::Me } else { WhoOwes::Other },
                        description: if me_debtor {
                            format!("You owe {username}")
                        } else {
                            format!("{username} owes you")
                        },
                        amount: d.amount,
                        created_at: d.created_at,
                    }
                })
                .collect();
            projected.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            conversation.debts = projected;
        }
    }

    // -----------------------------------------------------------------------
    // Accessors
    // -----------------------------------------------------------------------

    pub fn contains(&self, conversation_id: UserId) -> bool {
        self.conversations.contains_key(&conversation_id)
    }

    pub fn conversation(&self, conversation_id: UserId) -> Option<&Conversation> {
        self.conversations.get(&conversation_id)
    }

    /// Snapshot of all conversations.
    pub fn conversations(&self) -> Vec<Conversation> {
        self.conversations.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.conversations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.conversations.is_empty()
    }
}

/// Convert history-endpoint messages (most recent first) into store form,
/// oldest first, marked read.
pub fn history_to_messages(wire: Vec<InboundMessage>) -> Vec<Message> {
    wire.into_iter()
        .rev()
        .map(|m| Message::from_wire(m, DeliveryStatus::Read))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use tally_shared::protocol::InboundMessage;
    use tally_shared::types::MessageId;

    fn user(id: i64, name: &str) -> User {
        User {
            id: UserId(id),
            username: name.to_string(),
            email: format!("{name}@example.com"),
            avatar: None,
        }
    }

    fn hydrated() -> ConversationStore {
        let mut store = ConversationStore::new();
        store.hydrate(
            UserId(1),
            vec![user(1, "me"), user(2, "alice"), user(3, "bob")],
        );
        store
    }

    fn inbound(sender: i64, receiver: i64, content: &str) -> Message {
        Message::from_wire(
            InboundMessage {
                id: 100,
                sender_id: UserId(sender),
                receiver_id: UserId(receiver),
                content: content.to_string(),
                created_at: Utc::now(),
                ai_analysis: None,
            },
            DeliveryStatus::Read,
        )
    }

    #[test]
    fn test_hydrate_excludes_local_user() {
        let store = hydrated();
        assert_eq!(store.len(), 2);
        assert!(store.contains(UserId(2)));
        assert!(!store.contains(UserId(1)));
    }

    #[test]
    fn test_hydrate_is_a_full_replace() {
        let mut store = hydrated();
        store.append_outbound(UserId(1), UserId(2), "hi");

        store.hydrate(UserId(1), vec![user(2, "alice")]);
        let conversation = store.conversation(UserId(2)).unwrap();
        assert!(conversation.messages.is_empty());
        assert_eq!(conversation.unread, 0);
    }

    #[test]
    fn test_optimistic_send_appends_immediately() {
        let mut store = hydrated();
        let message = store.append_outbound(UserId(1), UserId(2), "hi").unwrap();

        assert!(message.id.is_local());
        assert_eq!(message.status, DeliveryStatus::Sent);

        let conversation = store.conversation(UserId(2)).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.unread, 0);
        assert_eq!(conversation.last_message, Some(message));
    }

    #[test]
    fn test_outbound_to_unknown_conversation_is_rejected() {
        let mut store = hydrated();
        assert!(store.append_outbound(UserId(1), UserId(99), "hi").is_none());
    }

    #[test]
    fn test_echo_of_own_send_is_not_duplicated() {
        let mut store = hydrated();
        let me = UserId(1);
        store.append_outbound(me, UserId(2), "hi");

        // The transport echoes the send back; classification drops it
        // before it reaches the store.
        let echo = InboundMessage {
            id: 500,
            sender_id: me,
            receiver_id: UserId(2),
            content: "hi".to_string(),
            created_at: Utc::now(),
            ai_analysis: None,
        };
        if let crate::reconcile::Classification::New { conversation_id } =
            crate::reconcile::classify(me, &echo)
        {
            store.apply_inbound(
                conversation_id,
                Message::from_wire(echo, DeliveryStatus::Read),
                None,
            );
        }

        let conversation = store.conversation(UserId(2)).unwrap();
        assert_eq!(conversation.messages.len(), 1);
        assert_eq!(conversation.messages[0].status, DeliveryStatus::Sent);
        assert_eq!(conversation.unread, 0);
    }

    #[test]
    fn test_activation_side_effects_reset_unread_and_start_history_load() {
        let mut store = hydrated();
        store.apply_inbound(UserId(2), inbound(2, 1, "hey"), None);
        assert_eq!(store.unread(UserId(2)), 1);

        // Activation zeroes unread and kicks off a history fetch.
        store.clear_unread(UserId(2));
        let generation = store.begin_history_load(UserId(2));

        assert_eq!(store.unread(UserId(2)), 0);
        assert!(generation.is_some());
        assert!(store.is_loading_history());
    }

    #[test]
    fn test_inbound_increments_unread_while_inactive() {
        let mut store = hydrated();
        assert!(store.apply_inbound(UserId(2), inbound(2, 1, "hey"), None));
        assert!(store.apply_inbound(UserId(2), inbound(2, 1, "you there?"), None));

        let conversation = store.conversation(UserId(2)).unwrap();
        assert_eq!(conversation.unread, 2);
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(
            conversation.last_message.as_ref().unwrap().content,
            "you there?"
        );
    }

    #[test]
    fn test_inbound_to_active_conversation_stays_read() {
        let mut store = hydrated();
        store.apply_inbound(UserId(2), inbound(2, 1, "hey"), Some(UserId(2)));
        assert_eq!(store.unread(UserId(2)), 0);
    }

    #[test]
    fn test_inbound_to_other_active_conversation_counts() {
        let mut store = hydrated();
        store.apply_inbound(UserId(2), inbound(2, 1, "hey"), Some(UserId(3)));
        assert_eq!(store.unread(UserId(2)), 1);
    }

    #[test]
    fn test_clear_unread() {
        let mut store = hydrated();
        store.apply_inbound(UserId(2), inbound(2, 1, "hey"), None);
        store.clear_unread(UserId(2));
        assert_eq!(store.unread(UserId(2)), 0);
    }

    #[test]
    fn test_history_replace_sets_tail_pointer() {
        let mut store = hydrated();
        let generation = store.begin_history_load(UserId(2)).unwrap();
        assert!(store.is_loading_history());

        let applied = store.finish_history_load(
            UserId(2),
            generation,
            Some(vec![inbound(2, 1, "first"), inbound(1, 2, "second")]),
        );

        assert!(applied);
        assert!(!store.is_loading_history());
        let conversation = store.conversation(UserId(2)).unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(
            conversation.last_message.as_ref().unwrap().content,
            "second"
        );
    }

    #[test]
    fn test_stale_history_response_is_discarded() {
        let mut store = hydrated();
        let stale = store.begin_history_load(UserId(2)).unwrap();
        // User navigated away and back: a second fetch supersedes the first.
        let current = store.begin_history_load(UserId(2)).unwrap();

        assert!(!store.finish_history_load(
            UserId(2),
            stale,
            Some(vec![inbound(2, 1, "old answer")]),
        ));
        assert!(store
            .conversation(UserId(2))
            .unwrap()
            .messages
            .is_empty());

        assert!(store.finish_history_load(
            UserId(2),
            current,
            Some(vec![inbound(2, 1, "fresh answer")]),
        ));
    }

    #[test]
    fn test_failed_history_load_clears_flag_and_keeps_state() {
        let mut store = hydrated();
        store.apply_inbound(UserId(2), inbound(2, 1, "kept"), None);

        let generation = store.begin_history_load(UserId(2)).unwrap();
        assert!(!store.finish_history_load(UserId(2), generation, None));

        assert!(!store.is_loading_history());
        assert_eq!(store.conversation(UserId(2)).unwrap().messages.len(), 1);
    }

    #[test]
    fn test_history_to_messages_reverses_and_marks_read() {
        let newer = InboundMessage {
            id: 2,
            sender_id: UserId(2),
            receiver_id: UserId(1),
            content: "newer".to_string(),
            created_at: Utc::now(),
            ai_analysis: None,
        };
        let older = InboundMessage {
            id: 1,
            sender_id: UserId(1),
            receiver_id: UserId(2),
            content: "older".to_string(),
            created_at: Utc::now() - Duration::minutes(5),
            ai_analysis: None,
        };

        let messages = history_to_messages(vec![newer, older]);
        assert_eq!(messages[0].content, "older");
        assert_eq!(messages[1].content, "newer");
        assert_eq!(messages[1].id, MessageId::Server(2));
        assert!(messages
            .iter()
            .all(|m| m.status == DeliveryStatus::Read));
    }

    #[test]
    fn test_tasks_partition_by_creator_or_assignee() {
        let mut store = hydrated();
        let task = |id, created_by, assigned_to| Task {
            id,
            created_by: UserId(created_by),
            assigned_to: UserId(assigned_to),
            item_name: format!("task {id}"),
            status: crate::models::TaskStatus::Pending,
            related_message_id: None,
            created_at: Utc::now(),
            completed_at: None,
        };

        store.set_tasks(vec![task(1, 2, 1), task(2, 1, 3), task(3, 1, 2)]);

        let alice = store.conversation(UserId(2)).unwrap();
        let bob = store.conversation(UserId(3)).unwrap();
        assert_eq!(
            alice.tasks.iter().map(|t| t.id).collect::<Vec<_>>(),
            vec![1, 3]
        );
        assert_eq!(bob.tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn test_debts_project_direction_and_sort_newest_first() {
        let mut store = hydrated();
        let now = Utc::now();
        let debt = |id, debtor, creditor, at| DebtRecord {
            id,
            debtor_id: UserId(debtor),
            creditor_id: UserId(creditor),
            amount: 50.0,
            status: crate::models::DebtStatus::Active,
            created_at: at,
        };

        store.set_debts(
            UserId(1),
            vec![
                debt(1, 1, 2, now - Duration::hours(2)),
                debt(2, 2, 1, now),
                debt(3, 3, 1, now),
            ],
        );

        let alice = store.conversation(UserId(2)).unwrap();
        assert_eq!(alice.debts.len(), 2);
        // Newest first.
        assert_eq!(alice.debts[0].id, 2);
        assert_eq!(alice.debts[0].who_owes, WhoOwes::Other);
        assert_eq!(alice.debts[0].description, "alice owes you");
        assert_eq!(alice.debts[1].who_owes, WhoOwes::Me);
        assert_eq!(alice.debts[1].description, "You owe alice");

        let bob = store.conversation(UserId(3)).unwrap();
        assert_eq!(bob.debts.len(), 1);
        assert_eq!(bob.debts[0].who_owes, WhoOwes::Other);
    }
}
