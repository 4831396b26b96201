//! Domain model structs held by the conversation store.
//!
//! Every struct derives `Serialize` so it can be handed directly to a UI
//! layer; the wire-facing ones derive `Deserialize` as well.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tally_shared::protocol::{Annotation, InboundMessage};
use tally_shared::types::{DeliveryStatus, MessageId, UserId};

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// A chat participant, as returned by the user listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A single chat message as held in a conversation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotation: Option<Annotation>,
}

impl Message {
    /// Build the optimistic local copy of an outbound message.
    ///
    /// The id is locally generated and the status starts at `Sent`; the
    /// server-confirmed echo is discarded rather than merged, so both stay
    /// as created here.
    pub fn outbound(sender: UserId, receiver: UserId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::local(),
            sender_id: sender,
            receiver_id: receiver,
            content: content.into(),
            created_at: Utc::now(),
            status: DeliveryStatus::Sent,
            annotation: None,
        }
    }

    /// Convert a transport- or history-delivered message into store form.
    pub fn from_wire(wire: InboundMessage, status: DeliveryStatus) -> Self {
        Self {
            id: MessageId::Server(wire.id),
            sender_id: wire.sender_id,
            receiver_id: wire.receiver_id,
            content: wire.content,
            created_at: wire.created_at,
            status,
            annotation: wire.ai_analysis,
        }
    }
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

/// A shared task extracted from the conversation by the analysis step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: i64,
    pub created_by: UserId,
    pub assigned_to: UserId,
    pub item_name: String,
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_message_id: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

// ---------------------------------------------------------------------------
// Debt
// ---------------------------------------------------------------------------

/// An active debt record as returned by the debt history endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebtRecord {
    pub id: i64,
    pub debtor_id: UserId,
    pub creditor_id: UserId,
    pub amount: f64,
    pub status: DebtStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DebtStatus {
    Active,
    Settled,
}

/// A debt record projected into one conversation's view.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ConversationDebt {
    pub id: i64,
    pub who_owes: WhoOwes,
    pub description: String,
    pub amount: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum WhoOwes {
    Me,
    Other,
}

/// Aggregate balance across all counterparts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DebtBalance {
    pub user_id: UserId,
    pub username: String,
    pub total_owed: f64,
    pub total_to_collect: f64,
    pub net_balance: f64,
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// One two-party conversation, keyed by the counterpart's user id.
///
/// The message list is append-only from this engine's point of view;
/// `last_message` always equals the tail of `messages` when non-empty.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Conversation {
    pub user: User,
    pub messages: Vec<Message>,
    pub last_message: Option<Message>,
    pub unread: u32,
    pub tasks: Vec<Task>,
    pub debts: Vec<ConversationDebt>,
    /// Generation of the most recently requested history fetch; a late
    /// response with a stale generation is discarded at apply time.
    #[serde(skip)]
    pub(crate) history_generation: u64,
}

impl Conversation {
    pub fn new(user: User) -> Self {
        Self {
            user,
            messages: Vec::new(),
            last_message: None,
            unread: 0,
            tasks: Vec::new(),
            debts: Vec::new(),
            history_generation: 0,
        }
    }

    /// The counterpart's user id, which is also the conversation id.
    pub fn id(&self) -> UserId {
        self.user.id
    }

    /// Append a message, keeping the last-message pointer on the tail.
    pub(crate) fn append(&mut self, message: Message) {
        self.last_message = Some(message.clone());
        self.messages.push(message);
    }

    /// Replace the full message list (history load), most-recent-last.
    pub(crate) fn replace_history(&mut self, messages: Vec<Message>) {
        self.last_message = messages.last().cloned();
        self.messages = messages;
    }
}
