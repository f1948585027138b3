//! Chat repository for database operations.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::entities::{Chat, ChatId, ChatType, Message, UserId};
use crate::repos::message_repository::MessageRepository;
use crate::stores::{ChatStore, MessageStore};
use crate::types::{Entity, StoreError, StoreResult};

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::from_sqlx(Entity::Chat, err)
}

/// Repository for chat database operations
#[derive(Clone)]
pub struct ChatRepository {
    pool: SqlitePool,
}

impl ChatRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn user_ids(&self, table: &str, id: &ChatId) -> StoreResult<BTreeSet<UserId>> {
        let query = format!("SELECT user_id FROM {table} WHERE chat_id = ?");
        let rows = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("user_id").map(UserId::from))
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(db_err)
    }

    fn chat_from_row(
        row: &SqliteRow,
        admins: BTreeSet<UserId>,
        members: BTreeSet<UserId>,
    ) -> StoreResult<Chat> {
        let chat_type: String = row.try_get("chat_type").map_err(db_err)?;
        Ok(Chat {
            id: ChatId::from(row.try_get::<String, _>("id").map_err(db_err)?),
            name: row.try_get("name").map_err(db_err)?,
            owner: UserId::from(row.try_get::<String, _>("owner_id").map_err(db_err)?),
            admins,
            members,
            chat_type: ChatType::from(chat_type.as_str()),
            created_at: Some(row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?),
            deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        })
    }

    async fn ensure_exists(&self, id: &ChatId) -> StoreResult<()> {
        let row = sqlx::query("SELECT 1 FROM chats WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(Entity::Chat, id)),
        }
    }
}

impl ChatStore for ChatRepository {
    async fn create_chat(&self, chat: &Chat) -> StoreResult<ChatId> {
        let id = if chat.id.is_blank() {
            ChatId::generate()
        } else {
            chat.id.clone()
        };
        let created_at = chat.created_at.unwrap_or_else(Utc::now);

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO chats (id, name, owner_id, chat_type, created_at, deleted_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&chat.name)
        .bind(chat.owner.as_str())
        .bind(chat.chat_type.as_str())
        .bind(created_at)
        .bind(chat.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for member in &chat.members {
            sqlx::query("INSERT INTO chat_members (chat_id, user_id) VALUES (?, ?)")
                .bind(id.as_str())
                .bind(member.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        for admin in &chat.admins {
            sqlx::query("INSERT INTO chat_admins (chat_id, user_id) VALUES (?, ?)")
                .bind(id.as_str())
                .bind(admin.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        info!(chat_id = %id, owner = %chat.owner, members = chat.members.len(), "created chat");
        Ok(id)
    }

    async fn find_chat(&self, id: &ChatId) -> StoreResult<Option<Chat>> {
        let row = sqlx::query(
            "SELECT id, name, owner_id, chat_type, created_at, deleted_at FROM chats WHERE id = ?",
        )
        .bind(id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let admins = self.user_ids("chat_admins", id).await?;
        let members = self.user_ids("chat_members", id).await?;
        Self::chat_from_row(&row, admins, members).map(Some)
    }

    async fn update_chat(&self, chat: &Chat) -> StoreResult<()> {
        let result = sqlx::query("UPDATE chats SET name = ?, owner_id = ? WHERE id = ?")
            .bind(&chat.name)
            .bind(chat.owner.as_str())
            .bind(chat.id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Chat, &chat.id));
        }

        info!(chat_id = %chat.id, name = %chat.name, "updated chat");
        Ok(())
    }

    async fn delete_chat(&self, id: &ChatId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        for table in ["chat_admins", "chat_members"] {
            sqlx::query(&format!("DELETE FROM {table} WHERE chat_id = ?"))
                .bind(id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        let result = sqlx::query("DELETE FROM chats WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Chat, id));
        }

        tx.commit().await.map_err(db_err)?;
        info!(chat_id = %id, "deleted chat");
        Ok(())
    }

    async fn add_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()> {
        self.ensure_exists(id).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for user_id in user_ids {
            sqlx::query("INSERT OR IGNORE INTO chat_members (chat_id, user_id) VALUES (?, ?)")
                .bind(id.as_str())
                .bind(user_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        info!(chat_id = %id, added = user_ids.len(), "added chat members");
        Ok(())
    }

    async fn remove_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()> {
        self.ensure_exists(id).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for user_id in user_ids {
            for table in ["chat_admins", "chat_members"] {
                sqlx::query(&format!(
                    "DELETE FROM {table} WHERE chat_id = ? AND user_id = ?"
                ))
                .bind(id.as_str())
                .bind(user_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
            }
        }
        tx.commit().await.map_err(db_err)?;

        info!(chat_id = %id, removed = user_ids.len(), "removed chat members");
        Ok(())
    }

    async fn list_members(&self, id: &ChatId) -> StoreResult<BTreeSet<UserId>> {
        self.ensure_exists(id).await?;
        self.user_ids("chat_members", id).await
    }

    async fn add_admin(&self, id: &ChatId, user_id: &UserId) -> StoreResult<()> {
        self.ensure_exists(id).await?;

        let user = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        if user.is_none() {
            return Err(StoreError::not_found(Entity::User, user_id));
        }

        sqlx::query("INSERT OR IGNORE INTO chat_admins (chat_id, user_id) VALUES (?, ?)")
            .bind(id.as_str())
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        info!(chat_id = %id, user_id = %user_id, "promoted chat admin");
        Ok(())
    }

    async fn list_messages(&self, id: &ChatId) -> StoreResult<Vec<Message>> {
        self.ensure_exists(id).await?;
        MessageRepository::new(self.pool.clone()).list_by_chat(id).await
    }

    async fn list_chat_ids(&self) -> StoreResult<Vec<ChatId>> {
        let rows = sqlx::query("SELECT id FROM chats ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map(ChatId::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }
}
