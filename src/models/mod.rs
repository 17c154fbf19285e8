//! Indexing job types.
//!
//! An [`IndexingJob`] is created by the chat pipeline once per persisted
//! message. It is fully self-contained - the queue relays it without
//! consulting any other store - and its serde form is the JSON wire format
//! for queued mode.

use serde::{Deserialize, Serialize};

/// Author of a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// One content segment of a chat message.
///
/// Only text segments carry indexable content; attachments, tool calls and
/// any other part types deserialize into `Other` and contribute nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessagePart {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// The unit of indexing work: one persisted chat message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexingJob {
    pub message_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub role: MessageRole,
    pub parts: Vec<MessagePart>,
}

impl IndexingJob {
    /// Extract plain text: text segments in their original order, one per
    /// line. Non-text segments are dropped.
    pub fn plain_text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                MessagePart::Text { text } => Some(text.as_str()),
                MessagePart::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}
