//! Chat wire protocol.
//!
//! Inbound frames are `{message, sender}` JSON objects. Everything sent to a
//! client is a `chat_message` envelope.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reserved sender name for server-generated notices. Never persisted.
pub const SYSTEM_SENDER: &str = "system";

/// Display identity used when the client does not supply a username
pub const ANONYMOUS_USERNAME: &str = "匿名用户";

/// Sent back to the originator when its frame could not be processed
pub const PROCESSING_FAILED_MESSAGE: &str = "消息处理失败，请重试";

/// Inbound client payload
#[derive(Debug, Clone, Deserialize)]
pub struct InboundMessage {
    pub message: String,
    /// Falls back to the connection's display identity when omitted
    #[serde(default)]
    pub sender: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeType {
    ChatMessage,
}

/// Outbound envelope delivered to every room member
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatEnvelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeType,
    pub message: String,
    pub sender: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
}

impl ChatEnvelope {
    pub fn chat(
        message: impl Into<String>,
        sender: impl Into<String>,
        timestamp: DateTime<Utc>,
        id: Option<i64>,
    ) -> Self {
        Self {
            kind: EnvelopeType::ChatMessage,
            message: message.into(),
            sender: sender.into(),
            timestamp,
            id,
        }
    }

    pub fn system(message: impl Into<String>) -> Self {
        Self::chat(message, SYSTEM_SENDER, Utc::now(), None)
    }

    /// Notice broadcast when a member disconnects
    pub fn departure(username: &str) -> Self {
        Self::system(format!("{} 离开了聊天室", username))
    }

    pub fn processing_failed() -> Self {
        Self::system(PROCESSING_FAILED_MESSAGE)
    }

    pub fn is_system(&self) -> bool {
        self.sender == SYSTEM_SENDER
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_wire_shape() {
        let ts = "2024-05-01T08:30:00Z".parse::<DateTime<Utc>>().unwrap();
        let envelope = ChatEnvelope::chat("hi", "alice", ts, Some(7));

        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "type": "chat_message",
                "message": "hi",
                "sender": "alice",
                "timestamp": "2024-05-01T08:30:00Z",
                "id": 7
            })
        );
    }

    #[test]
    fn test_system_envelope_omits_id() {
        let value = serde_json::to_value(ChatEnvelope::departure("bob")).unwrap();

        assert_eq!(value["sender"], "system");
        assert_eq!(value["message"], "bob 离开了聊天室");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_inbound_sender_is_optional() {
        let parsed: InboundMessage = serde_json::from_str(r#"{"message": "hello"}"#).unwrap();
        assert_eq!(parsed.message, "hello");
        assert!(parsed.sender.is_none());
    }
}
