//! User repository for database operations.

use std::collections::BTreeSet;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::info;

use crate::entities::{ChatId, Gender, User, UserId};
use crate::stores::UserStore;
use crate::types::{Entity, StoreError, StoreResult};

const USER_COLUMNS: &str = "id, username, first_name, last_name, password, gender, email,
     date_of_birth, created_at, deleted_at";

fn db_err(err: sqlx::Error) -> StoreError {
    StoreError::from_sqlx(Entity::User, err)
}

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn ensure_exists(&self, id: &UserId) -> StoreResult<()> {
        let row = sqlx::query("SELECT 1 FROM users WHERE id = ?")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        match row {
            Some(_) => Ok(()),
            None => Err(StoreError::not_found(Entity::User, id)),
        }
    }

    async fn hydrate(&self, row: SqliteRow) -> StoreResult<User> {
        let id = UserId::from(row.try_get::<String, _>("id").map_err(db_err)?);

        let contacts = sqlx::query("SELECT contact_id FROM user_contacts WHERE user_id = ?")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?
            .iter()
            .map(|r| r.try_get::<String, _>("contact_id").map(UserId::from))
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(db_err)?;

        let chat_ids = self.chat_index(&id).await?;
        let gender: String = row.try_get("gender").map_err(db_err)?;

        Ok(User {
            id,
            username: row.try_get("username").map_err(db_err)?,
            first_name: row.try_get("first_name").map_err(db_err)?,
            last_name: row.try_get("last_name").map_err(db_err)?,
            password: row.try_get("password").map_err(db_err)?,
            gender: Gender::from(gender.as_str()),
            email: row.try_get("email").map_err(db_err)?,
            date_of_birth: row.try_get::<NaiveDate, _>("date_of_birth").map_err(db_err)?,
            contacts,
            chat_ids,
            created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(db_err)?,
            deleted_at: row.try_get("deleted_at").map_err(db_err)?,
        })
    }
}

impl UserStore for UserRepository {
    async fn create_user(&self, user: &User) -> StoreResult<UserId> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"
        ))
        .bind(user.id.as_str())
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password)
        .bind(user.gender.as_str())
        .bind(&user.email)
        .bind(user.date_of_birth)
        .bind(user.created_at)
        .bind(user.deleted_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        for contact in &user.contacts {
            sqlx::query("INSERT OR IGNORE INTO user_contacts (user_id, contact_id) VALUES (?, ?)")
                .bind(user.id.as_str())
                .bind(contact.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        for chat_id in &user.chat_ids {
            sqlx::query("INSERT OR IGNORE INTO user_chats (user_id, chat_id) VALUES (?, ?)")
                .bind(user.id.as_str())
                .bind(chat_id.as_str())
                .execute(&mut *tx)
                .await
                .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;

        info!(user_id = %user.id, username = %user.username, "created user");
        Ok(user.id.clone())
    }

    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = ? AND password = ?"
        ))
        .bind(username)
        .bind(password)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        match row {
            Some(row) => self.hydrate(row).await.map(Some),
            None => Ok(None),
        }
    }

    async fn add_chat_to_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()> {
        self.ensure_exists(id).await?;
        sqlx::query("INSERT OR IGNORE INTO user_chats (user_id, chat_id) VALUES (?, ?)")
            .bind(id.as_str())
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn remove_chat_from_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()> {
        self.ensure_exists(id).await?;
        sqlx::query("DELETE FROM user_chats WHERE user_id = ? AND chat_id = ?")
            .bind(id.as_str())
            .bind(chat_id.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn chat_index(&self, id: &UserId) -> StoreResult<BTreeSet<ChatId>> {
        self.ensure_exists(id).await?;
        let rows = sqlx::query("SELECT chat_id FROM user_chats WHERE user_id = ?")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("chat_id").map(ChatId::from))
            .collect::<Result<BTreeSet<_>, _>>()
            .map_err(db_err)
    }

    async fn add_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()> {
        self.ensure_exists(id).await?;
        self.ensure_exists(contact).await?;
        sqlx::query("INSERT OR IGNORE INTO user_contacts (user_id, contact_id) VALUES (?, ?)")
            .bind(id.as_str())
            .bind(contact.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        info!(user_id = %id, contact = %contact, "added contact");
        Ok(())
    }

    async fn remove_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()> {
        self.ensure_exists(id).await?;
        sqlx::query("DELETE FROM user_contacts WHERE user_id = ? AND contact_id = ?")
            .bind(id.as_str())
            .bind(contact.as_str())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        info!(user_id = %id, contact = %contact, "removed contact");
        Ok(())
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<UserId>> {
        let rows = sqlx::query("SELECT id FROM users ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("id").map(UserId::from))
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)
    }
}
