use serde::{Deserialize, Serialize};
use uuid::Uuid;

// User identity = server-assigned numeric id
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a chat message.
///
/// The server assigns a numeric id once it has seen the message; an
/// optimistic message that is still in flight carries a locally generated
/// id instead. The two never collide.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum MessageId {
    Server(i64),
    Local(Uuid),
}

impl MessageId {
    /// Generate a fresh local id for an in-flight optimistic message.
    pub fn local() -> Self {
        Self::Local(Uuid::new_v4())
    }

    pub fn is_local(&self) -> bool {
        matches!(self, Self::Local(_))
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Server(id) => write!(f, "{id}"),
            Self::Local(id) => write!(f, "local:{id}"),
        }
    }
}

/// Delivery status of a message from this client's point of view.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Delivered,
    Read,
}

/// Lifecycle state of the WebSocket transport.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}
