//! Message service for storing and removing chat messages.

use parley_database::{ChatId, Message, MessageId, MessageStore};
use tracing::info;

use crate::types::{ChatError, ChatResult};

/// Service for message operations
#[derive(Clone)]
pub struct MessageService<M> {
    messages: M,
}

impl<M> MessageService<M>
where
    M: MessageStore,
{
    pub fn new(messages: M) -> Self {
        Self { messages }
    }

    pub async fn send_message(&self, message: Message) -> ChatResult<MessageId> {
        if message.sender_id.is_blank() {
            return Err(ChatError::MissingField("sender_id"));
        }
        if message.chat_id.is_blank() {
            return Err(ChatError::MissingField("chat_id"));
        }
        if message.content.trim().is_empty() {
            return Err(ChatError::MissingField("content"));
        }

        let id = self
            .messages
            .create_message(&message)
            .await
            .map_err(|e| ChatError::store("send_message", e))?;

        info!(message_id = %id, chat_id = %message.chat_id, sender = %message.sender_id, "sent message");
        Ok(id)
    }

    pub async fn get_message(&self, id: &MessageId) -> ChatResult<Message> {
        if id.is_blank() {
            return Err(ChatError::MissingField("message_id"));
        }
        self.messages
            .find_message(id)
            .await
            .map_err(|e| ChatError::store("get_message", e))?
            .ok_or_else(|| ChatError::MessageNotFound(id.clone()))
    }

    /// Deletes a message that belongs to `chat_id`.
    pub async fn delete_message(&self, chat_id: &ChatId, id: &MessageId) -> ChatResult<()> {
        let message = self.get_message(id).await?;
        if &message.chat_id != chat_id {
            return Err(ChatError::MessageNotFound(id.clone()));
        }

        self.messages
            .delete_message(id)
            .await
            .map_err(|e| ChatError::store("delete_message", e))?;

        info!(message_id = %id, chat_id = %chat_id, "deleted message");
        Ok(())
    }
}
