//! Conversation Document
//!
//! The single persisted unit per session. Partition key is the user id,
//! document id is the session id.

use super::message::Message;
use serde::{Deserialize, Serialize};

/// Stored shape of one session's full history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationDocument {
    /// Session id, unique within the partition
    pub id: String,
    /// User id, also the partition key
    #[serde(rename = "userid")]
    pub user_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl ConversationDocument {
    pub fn new(session_id: &str, user_id: &str, messages: &[Message]) -> Self {
        Self {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            messages: messages.to_vec(),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    /// Extra fields added by a backend are ignored
    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::Role;
    use serde_json::json;

    #[test]
    fn test_layout_matches_storage_contract() {
        let doc = ConversationDocument::new(
            "session-1",
            "user-1",
            &[Message::human("Hello"), Message::ai("Hi there")],
        );
        let value: serde_json::Value = serde_json::from_slice(&doc.to_bytes().unwrap()).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "session-1",
                "userid": "user-1",
                "messages": [
                    {"role": "human", "content": "Hello"},
                    {"role": "ai", "content": "Hi there"}
                ]
            })
        );
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let raw = json!({
            "id": "s",
            "userid": "u",
            "_etag": "\"0000\"",
            "_ts": 1700000000,
            "ttl": 60,
            "messages": [
                {"role": "system", "content": "be brief", "data": {"nested": true}}
            ]
        });
        let doc = ConversationDocument::from_bytes(raw.to_string().as_bytes()).unwrap();

        assert_eq!(doc.messages.len(), 1);
        assert_eq!(doc.messages[0].role, Role::System);
        assert_eq!(doc.messages[0].content, "be brief");
    }

    #[test]
    fn test_missing_messages_decode_as_empty() {
        let doc = ConversationDocument::from_bytes(br#"{"id":"s","userid":"u"}"#).unwrap();
        assert!(doc.messages.is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error() {
        assert!(ConversationDocument::from_bytes(b"{not json").is_err());
        assert!(ConversationDocument::from_bytes(br#"{"id":"s","userid":"u","messages":"x"}"#).is_err());
    }
}
