//! Inbound message classification.
//!
//! Outbound messages are appended optimistically at send time, so the
//! server's echo of a self-originated message must not be appended again.
//! Classification trusts the sender id: a frame whose sender is the local
//! user is taken to be such an echo and dropped. No id matching is
//! attempted; a stronger scheme would correlate by a client-generated id
//! and upgrade the optimistic entry in place.

use tally_shared::protocol::InboundMessage;
use tally_shared::types::UserId;

/// Outcome of classifying an inbound transport message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    /// Echo of a message this client already appended on send; not
    /// re-appended.
    Echo,
    /// A counterpart message to append to the given conversation.
    New { conversation_id: UserId },
}

/// Classify an inbound message against the local user's identity.
///
/// Also resolves the owning conversation: the counterpart is the receiver
/// when we sent the message, the sender otherwise.
pub fn classify(local_user: UserId, message: &InboundMessage) -> Classification {
    if message.sender_id == local_user {
        Classification::Echo
    } else {
        Classification::New {
            conversation_id: message.sender_id,
        }
    }
}

/// The conversation an inbound message belongs to, regardless of
/// classification.
pub fn conversation_of(local_user: UserId, message: &InboundMessage) -> UserId {
    if message.sender_id == local_user {
        message.receiver_id
    } else {
        message.sender_id
    }
}
