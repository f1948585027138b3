//! Session repository for database operations.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::entities::{expiry_after, ChatId, Role, Session, SessionChat, SessionId, UserId};
use crate::stores::SessionStore;
use crate::types::{Entity, StoreError, StoreResult};

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::from_sqlx(Entity::Session, err)
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Repository for session database operations
#[derive(Clone)]
pub struct SessionRepository {
    pool: SqlitePool,
}

impl SessionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        let row = sqlx::query(
            "SELECT id, user_id, version, created_at, expires_at
             FROM sessions WHERE id = ? AND expires_at > ?",
        )
        .bind(id.as_str())
        .bind(now_millis())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mapping_rows =
            sqlx::query("SELECT chat_name, chat_id, role FROM session_chats WHERE session_id = ?")
                .bind(id.as_str())
                .fetch_all(&self.pool)
                .await
                .map_err(db_err)?;

        let mut chats = BTreeMap::new();
        for mapping in mapping_rows {
            let role: String = mapping.try_get("role").map_err(db_err)?;
            let role = role
                .parse::<Role>()
                .map_err(|e| StoreError::Database(e.to_string()))?;
            chats.insert(
                mapping.try_get::<String, _>("chat_name").map_err(db_err)?,
                SessionChat {
                    chat_id: ChatId::from(mapping.try_get::<String, _>("chat_id").map_err(db_err)?),
                    role,
                },
            );
        }

        let expires_ms: i64 = row.try_get("expires_at").map_err(db_err)?;
        let expires_at = Utc
            .timestamp_millis_opt(expires_ms)
            .single()
            .ok_or_else(|| StoreError::Database(format!("invalid expiry {expires_ms}")))?;
        let version: i64 = row.try_get("version").map_err(db_err)?;

        Ok(Some(Session {
            id: SessionId::from(row.try_get::<String, _>("id").map_err(db_err)?),
            user_id: UserId::from(row.try_get::<String, _>("user_id").map_err(db_err)?),
            chats,
            version: version.max(0) as u64,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
            expires_at,
        }))
    }

    async fn load_existing(&self, id: &SessionId) -> StoreResult<Session> {
        self.load(id)
            .await?
            .ok_or_else(|| StoreError::not_found(Entity::Session, id))
    }

    /// Opens a transaction on a live session.
    async fn begin_live(&self, id: &SessionId) -> StoreResult<Transaction<'static, Sqlite>> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let live = sqlx::query("SELECT 1 FROM sessions WHERE id = ? AND expires_at > ?")
            .bind(id.as_str())
            .bind(now_millis())
            .fetch_optional(&mut *tx)
            .await
            .map_err(db_err)?;
        if live.is_none() {
            return Err(StoreError::not_found(Entity::Session, id));
        }
        Ok(tx)
    }

    async fn bump_version(tx: &mut Transaction<'static, Sqlite>, id: &SessionId) -> StoreResult<()> {
        sqlx::query("UPDATE sessions SET version = version + 1 WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut **tx)
            .await
            .map_err(db_err)?;
        Ok(())
    }
}

impl SessionStore for SessionRepository {
    async fn create_session(&self, session: &Session, ttl: Duration) -> StoreResult<Session> {
        let expires_at = expiry_after(Utc::now(), ttl);
        let version = i64::try_from(session.version).unwrap_or(i64::MAX);

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "INSERT INTO sessions (id, user_id, version, created_at, expires_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session.id.as_str())
        .bind(session.user_id.as_str())
        .bind(version)
        .bind(session.created_at)
        .bind(expires_at.timestamp_millis())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for (name, entry) in &session.chats {
            sqlx::query(
                "INSERT INTO session_chats (session_id, chat_name, chat_id, role) VALUES (?, ?, ?, ?)",
            )
            .bind(session.id.as_str())
            .bind(name)
            .bind(entry.chat_id.as_str())
            .bind(entry.role.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        info!(session_id = %session.id, user_id = %session.user_id, chats = session.chats.len(), "created session");

        let mut stored = session.clone();
        stored.expires_at = expires_at;
        Ok(stored)
    }

    async fn find_session(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        self.load(id).await
    }

    async fn find_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Session>> {
        let rows = sqlx::query(
            "SELECT id FROM sessions WHERE user_id = ? AND expires_at > ? ORDER BY created_at",
        )
        .bind(user_id.as_str())
        .bind(now_millis())
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            let id = SessionId::from(row.try_get::<String, _>("id").map_err(db_err)?);
            // A session can expire between the two queries.
            if let Some(session) = self.load(&id).await? {
                sessions.push(session);
            }
        }
        Ok(sessions)
    }

    async fn add_chat_mapping(
        &self,
        id: &SessionId,
        name: &str,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session> {
        let mut tx = self.begin_live(id).await?;

        sqlx::query("DELETE FROM session_chats WHERE session_id = ? AND (chat_id = ? OR chat_name = ?)")
            .bind(id.as_str())
            .bind(chat_id.as_str())
            .bind(name)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO session_chats (session_id, chat_name, chat_id, role) VALUES (?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(name)
        .bind(chat_id.as_str())
        .bind(role.as_str())
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        Self::bump_version(&mut tx, id).await?;
        tx.commit().await.map_err(db_err)?;

        debug!(session_id = %id, chat_id = %chat_id, name, role = %role, "mapped chat into session");
        self.load_existing(id).await
    }

    async fn remove_chat_mapping(&self, id: &SessionId, chat_id: &ChatId) -> StoreResult<Session> {
        let mut tx = self.begin_live(id).await?;

        let result = sqlx::query("DELETE FROM session_chats WHERE session_id = ? AND chat_id = ?")
            .bind(id.as_str())
            .bind(chat_id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() > 0 {
            Self::bump_version(&mut tx, id).await?;
            debug!(session_id = %id, chat_id = %chat_id, "unmapped chat from session");
        }
        tx.commit().await.map_err(db_err)?;

        self.load_existing(id).await
    }

    async fn update_chat_role(
        &self,
        id: &SessionId,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session> {
        let mut tx = self.begin_live(id).await?;

        let result =
            sqlx::query("UPDATE session_chats SET role = ? WHERE session_id = ? AND chat_id = ?")
                .bind(role.as_str())
                .bind(id.as_str())
                .bind(chat_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::ChatMapping, chat_id));
        }

        Self::bump_version(&mut tx, id).await?;
        tx.commit().await.map_err(db_err)?;

        self.load_existing(id).await
    }

    async fn delete_session(&self, id: &SessionId) -> StoreResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query("DELETE FROM session_chats WHERE session_id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::not_found(Entity::Session, id));
        }

        tx.commit().await.map_err(db_err)?;
        info!(session_id = %id, "deleted session");
        Ok(())
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = now_millis();
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(
            "DELETE FROM session_chats WHERE session_id IN
             (SELECT id FROM sessions WHERE expires_at <= ?)",
        )
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let result = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        let purged = result.rows_affected();
        info!(purged, "purged expired sessions");
        Ok(purged)
    }
}
