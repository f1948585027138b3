//! Parley Database Crate
//!
//! Entities, store traits and their SQLite and in-memory implementations.

use parley_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod memory;
pub mod migrations;
pub mod repos;
pub mod stores;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

pub use entities::{
    expiry_after, Capability, Chat, ChatId, ChatType, Gender, Message, MessageId, NewUser, Role,
    Session, SessionChat, SessionId, UnknownRole, User, UserId,
};
pub use memory::{MemoryStore, StoreOp};
pub use repos::{ChatRepository, MessageRepository, SessionRepository, UserRepository};
pub use stores::{ChatStore, MessageStore, SessionStore, UserStore};
pub use types::{Entity, ErrorKind, StoreError, StoreResult};

/// Connect and bring the schema up to date.
pub async fn initialize_database(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    let pool = prepare_database(config).await?;
    run_migrations(&pool).await?;
    Ok(pool)
}
