//! Message entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{ChatId, MessageId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub sender_id: UserId,
    pub chat_id: ChatId,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// A message without an id; the store assigns one on insert.
    pub fn new(sender_id: UserId, chat_id: ChatId, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::default(),
            sender_id,
            chat_id,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}
