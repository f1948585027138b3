//! Message repository for database operations.

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::entities::{ChatId, Message, MessageId, UserId};
use crate::stores::MessageStore;
use crate::types::{Entity, StoreError, StoreResult};

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::from_sqlx(Entity::Message, err)
}

fn message_from_row(row: &SqliteRow) -> Result<Message, sqlx::Error> {
    Ok(Message {
        id: MessageId::from(row.try_get::<String, _>("id")?),
        sender_id: UserId::from(row.try_get::<String, _>("sender_id")?),
        chat_id: ChatId::from(row.try_get::<String, _>("chat_id")?),
        content: row.try_get("content")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

/// Repository for message database operations
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

impl MessageStore for MessageRepository {
    async fn create_message(&self, message: &Message) -> StoreResult<MessageId> {
        let id = if message.id.is_blank() {
            MessageId::generate()
        } else {
            message.id.clone()
        };

        sqlx::query(
            "INSERT INTO messages (id, chat_id, sender_id, content, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(message.chat_id.as_str())
        .bind(message.sender_id.as_str())
        .bind(&message.content)
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        info!(message_id = %id, chat_id = %message.chat_id, sender = %message.sender_id, "stored message");
        Ok(id)
    }

    async fn find_message(&self, id: &MessageId) -> StoreResult<Option<Message>> {
        let row = sqlx::query(
            "SELECT id, chat_id, sender_id, content, created_at FROM messages WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.as_ref().map(message_from_row).transpose().map_err(db_err)
    }

    async fn delete_message(&self, id: &MessageId) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Message, id));
        }

        info!(message_id = %id, "deleted message");
        Ok(())
    }

    async fn list_by_chat(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, chat_id, sender_id, content, created_at
             FROM messages WHERE chat_id = ? ORDER BY rowid ASC",
        )
        .bind(chat_id.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(message_from_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }
}
