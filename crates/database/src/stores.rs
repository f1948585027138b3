//! Storage interfaces the domain services are generic over.
//!
//! Each trait covers one aggregate. Writes that touch two aggregates are
//! composed by the services; no method here spans aggregates.

use std::collections::BTreeSet;
use std::time::Duration;

use crate::entities::{Chat, ChatId, Message, MessageId, Role, Session, SessionId, User, UserId};
use crate::types::StoreResult;

#[allow(async_fn_in_trait)]
pub trait ChatStore {
    /// Inserts the chat, assigning an id when it has none.
    async fn create_chat(&self, chat: &Chat) -> StoreResult<ChatId>;
    async fn find_chat(&self, id: &ChatId) -> StoreResult<Option<Chat>>;
    /// Persists name and owner of an existing chat.
    async fn update_chat(&self, chat: &Chat) -> StoreResult<()>;
    async fn delete_chat(&self, id: &ChatId) -> StoreResult<()>;
    /// Set-union into the member set.
    async fn add_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()>;
    /// Set-pull from the member and admin sets.
    async fn remove_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()>;
    async fn list_members(&self, id: &ChatId) -> StoreResult<BTreeSet<UserId>>;
    /// Set-union into the admin set. Both chat and user must exist.
    async fn add_admin(&self, id: &ChatId, user_id: &UserId) -> StoreResult<()>;
    /// Messages of a chat, oldest first.
    async fn list_messages(&self, id: &ChatId) -> StoreResult<Vec<Message>>;
    async fn list_chat_ids(&self) -> StoreResult<Vec<ChatId>>;
}

#[allow(async_fn_in_trait)]
pub trait UserStore {
    async fn create_user(&self, user: &User) -> StoreResult<UserId>;
    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>>;
    async fn find_by_credentials(&self, username: &str, password: &str)
        -> StoreResult<Option<User>>;
    async fn add_chat_to_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()>;
    async fn remove_chat_from_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()>;
    async fn chat_index(&self, id: &UserId) -> StoreResult<BTreeSet<ChatId>>;
    async fn add_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()>;
    async fn remove_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()>;
    async fn list_user_ids(&self) -> StoreResult<Vec<UserId>>;
}

#[allow(async_fn_in_trait)]
pub trait MessageStore {
    async fn create_message(&self, message: &Message) -> StoreResult<MessageId>;
    async fn find_message(&self, id: &MessageId) -> StoreResult<Option<Message>>;
    async fn delete_message(&self, id: &MessageId) -> StoreResult<()>;
    async fn list_by_chat(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>>;
}

/// Session persistence with TTL expiry. Expired sessions are never returned.
#[allow(async_fn_in_trait)]
pub trait SessionStore {
    /// Stores the session with `expires_at = now + ttl` and returns the stored copy.
    async fn create_session(&self, session: &Session, ttl: Duration) -> StoreResult<Session>;
    async fn find_session(&self, id: &SessionId) -> StoreResult<Option<Session>>;
    async fn find_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Session>>;
    async fn add_chat_mapping(
        &self,
        id: &SessionId,
        name: &str,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session>;
    /// Drops the mapping of `chat_id`; a session not mapping it is returned unchanged.
    async fn remove_chat_mapping(&self, id: &SessionId, chat_id: &ChatId) -> StoreResult<Session>;
    async fn update_chat_role(
        &self,
        id: &SessionId,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session>;
    async fn delete_session(&self, id: &SessionId) -> StoreResult<()>;
    /// Deletes expired sessions and returns how many were removed.
    async fn purge_expired(&self) -> StoreResult<u64>;
}
