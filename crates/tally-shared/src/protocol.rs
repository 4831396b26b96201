use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::types::UserId;

/// All frames the server pushes over the WebSocket, tagged by `type`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerFrame {
    /// A chat message (new or an echo of one of our own sends).
    Message(InboundMessage),

    /// A bare side-channel notification referencing a task or debt.
    Notification(NotificationFrame),
}

/// A chat message as delivered by the transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InboundMessage {
    /// Server-assigned message id.
    pub id: i64,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub created_at: DateTime<Utc>,
    /// Classification attached by the server-side analysis step, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_analysis: Option<Annotation>,
}

/// A notification that server-side task or debt state changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationFrame {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debt_id: Option<i64>,
}

/// Opaque classification attached to a message by the analysis step.
///
/// Only the `kind` discriminant is interpreted by this client; the rest of
/// the payload is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Annotation {
    #[serde(rename = "type")]
    pub kind: AnnotationKind,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Task,
    Expense,
    /// Any kind this client does not interpret.
    #[serde(other)]
    Unknown,
}

/// Client → server send request.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendFrame {
    pub receiver_id: UserId,
    pub content: String,
}

impl ServerFrame {
    /// Parse a transport text frame.
    pub fn decode(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl SendFrame {
    /// Serialize for transmission as a transport text frame.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_message_frame() {
        let raw = r#"{
            "type": "message",
            "id": 17,
            "sender_id": 3,
            "receiver_id": 1,
            "content": "lunch was 250, you owe half",
            "created_at": "2026-03-02T14:05:00Z",
            "ai_analysis": {"type": "expense", "amount": 125.0}
        }"#;

        let frame = ServerFrame::decode(raw).unwrap();
        let ServerFrame::Message(msg) = frame else {
            panic!("expected a message frame");
        };
        assert_eq!(msg.id, 17);
        assert_eq!(msg.sender_id, UserId(3));
        let annotation = msg.ai_analysis.unwrap();
        assert_eq!(annotation.kind, AnnotationKind::Expense);
        assert_eq!(annotation.payload["amount"], 125.0);
    }

    #[test]
    fn test_decode_notification_frame() {
        let raw = r#"{"type": "notification", "debt_id": 7}"#;

        let frame = ServerFrame::decode(raw).unwrap();
        let ServerFrame::Notification(n) = frame else {
            panic!("expected a notification frame");
        };
        assert_eq!(n.debt_id, Some(7));
        assert_eq!(n.task_id, None);
    }

    #[test]
    fn test_unknown_annotation_kind_is_preserved() {
        let raw = r#"{
            "type": "message",
            "id": 1,
            "sender_id": 2,
            "receiver_id": 1,
            "content": "hey",
            "created_at": "2026-03-02T14:05:00Z",
            "ai_analysis": {"type": "sentiment", "score": 0.9}
        }"#;

        let ServerFrame::Message(msg) = ServerFrame::decode(raw).unwrap() else {
            panic!("expected a message frame");
        };
        assert_eq!(msg.ai_analysis.unwrap().kind, AnnotationKind::Unknown);
    }

    #[test]
    fn test_decode_rejects_untagged_frame() {
        assert!(ServerFrame::decode(r#"{"id": 1}"#).is_err());
        assert!(ServerFrame::decode("not json at all").is_err());
    }

    #[test]
    fn test_encode_send_frame() {
        let frame = SendFrame {
            receiver_id: UserId(4),
            content: "on my way".to_string(),
        };
        let encoded = frame.encode().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(parsed["receiver_id"], 4);
        assert_eq!(parsed["content"], "on my way");
    }
}
