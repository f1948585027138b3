//! In-memory implementation of every store trait.
//!
//! Used by the service test suites. All state sits behind one async lock, so
//! each store call is atomic with respect to the others. Individual calls can
//! be made to fail with [`MemoryStore::inject_failure`] to reproduce partial
//! writes across aggregates.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::entities::{
    expiry_after, Chat, ChatId, Message, MessageId, Role, Session, SessionId, User, UserId,
};
use crate::stores::{ChatStore, MessageStore, SessionStore, UserStore};
use crate::types::{Entity, StoreError, StoreResult};

/// Store operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    CreateChat,
    FindChat,
    UpdateChat,
    DeleteChat,
    AddMembers,
    RemoveMembers,
    AddAdmin,
    CreateUser,
    FindUser,
    AddChatToIndex,
    RemoveChatFromIndex,
    AddContact,
    RemoveContact,
    CreateMessage,
    DeleteMessage,
    CreateSession,
    UpdateSession,
    DeleteSession,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    op: StoreOp,
    key: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    chats: HashMap<ChatId, Chat>,
    users: HashMap<UserId, User>,
    /// Messages with their insertion sequence.
    messages: HashMap<MessageId, (u64, Message)>,
    next_message_seq: u64,
    sessions: HashMap<SessionId, Session>,
    failures: Vec<InjectedFailure>,
}

impl MemoryState {
    fn check(&self, op: StoreOp, key: &str) -> StoreResult<()> {
        let hit = self
            .failures
            .iter()
            .any(|f| f.op == op && f.key.as_deref().map_or(true, |k| k == key));
        if hit {
            return Err(StoreError::Database(format!(
                "injected failure: {op:?} {key}"
            )));
        }
        Ok(())
    }

    fn chat_mut(&mut self, id: &ChatId) -> StoreResult<&mut Chat> {
        self.chats
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(Entity::Chat, id))
    }

    fn user_mut(&mut self, id: &UserId) -> StoreResult<&mut User> {
        self.users
            .get_mut(id)
            .ok_or_else(|| StoreError::not_found(Entity::User, id))
    }

    fn live_session_mut(&mut self, id: &SessionId) -> StoreResult<&mut Session> {
        let now = Utc::now();
        match self.sessions.get_mut(id) {
            Some(session) if !session.is_expired_at(now) => Ok(session),
            _ => Err(StoreError::not_found(Entity::Session, id)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later call of `op` fail, or only those whose leading id equals `key`.
    pub async fn inject_failure(&self, op: StoreOp, key: Option<&str>) {
        let mut state = self.state.write().await;
        state.failures.push(InjectedFailure {
            op,
            key: key.map(str::to_string),
        });
    }

    pub async fn clear_failures(&self) {
        self.state.write().await.failures.clear();
    }

    /// Stores a session as-is, expired or not.
    pub async fn insert_session_raw(&self, session: Session) {
        let mut state = self.state.write().await;
        state.sessions.insert(session.id.clone(), session);
    }

    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }
}

impl ChatStore for MemoryStore {
    async fn create_chat(&self, chat: &Chat) -> StoreResult<ChatId> {
        let mut state = self.state.write().await;
        state.check(StoreOp::CreateChat, chat.id.as_str())?;

        let duplicate = state
            .chats
            .values()
            .any(|c| c.owner == chat.owner && c.name == chat.name);
        if duplicate {
            return Err(StoreError::Duplicate {
                entity: Entity::Chat,
                detail: format!("{} already owns a chat named {}", chat.owner, chat.name),
            });
        }

        let id = if chat.id.is_blank() {
            ChatId::generate()
        } else {
            chat.id.clone()
        };
        if state.chats.contains_key(&id) {
            return Err(StoreError::Duplicate {
                entity: Entity::Chat,
                detail: format!("id {id}"),
            });
        }

        let mut stored = chat.clone();
        stored.id = id.clone();
        state.chats.insert(id.clone(), stored);
        Ok(id)
    }

    async fn find_chat(&self, id: &ChatId) -> StoreResult<Option<Chat>> {
        let state = self.state.read().await;
        state.check(StoreOp::FindChat, id.as_str())?;
        Ok(state.chats.get(id).cloned())
    }

    async fn update_chat(&self, chat: &Chat) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateChat, chat.id.as_str())?;

        let clash = state
            .chats
            .values()
            .any(|c| c.id != chat.id && c.owner == chat.owner && c.name == chat.name);
        if clash {
            return Err(StoreError::Duplicate {
                entity: Entity::Chat,
                detail: format!("{} already owns a chat named {}", chat.owner, chat.name),
            });
        }

        let stored = state.chat_mut(&chat.id)?;
        stored.name = chat.name.clone();
        stored.owner = chat.owner.clone();
        Ok(())
    }

    async fn delete_chat(&self, id: &ChatId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::DeleteChat, id.as_str())?;
        state
            .chats
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Entity::Chat, id))
    }

    async fn add_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::AddMembers, id.as_str())?;
        let chat = state.chat_mut(id)?;
        chat.members.extend(user_ids.iter().cloned());
        Ok(())
    }

    async fn remove_members(&self, id: &ChatId, user_ids: &[UserId]) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::RemoveMembers, id.as_str())?;
        let chat = state.chat_mut(id)?;
        for user_id in user_ids {
            chat.members.remove(user_id);
            chat.admins.remove(user_id);
        }
        Ok(())
    }

    async fn list_members(&self, id: &ChatId) -> StoreResult<BTreeSet<UserId>> {
        let state = self.state.read().await;
        state
            .chats
            .get(id)
            .map(|chat| chat.members.clone())
            .ok_or_else(|| StoreError::not_found(Entity::Chat, id))
    }

    async fn add_admin(&self, id: &ChatId, user_id: &UserId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::AddAdmin, id.as_str())?;
        if !state.users.contains_key(user_id) {
            return Err(StoreError::not_found(Entity::User, user_id));
        }
        let chat = state.chat_mut(id)?;
        chat.admins.insert(user_id.clone());
        Ok(())
    }

    async fn list_messages(&self, id: &ChatId) -> StoreResult<Vec<Message>> {
        if self.find_chat(id).await?.is_none() {
            return Err(StoreError::not_found(Entity::Chat, id));
        }
        self.list_by_chat(id).await
    }

    async fn list_chat_ids(&self) -> StoreResult<Vec<ChatId>> {
        let state = self.state.read().await;
        let mut ids: Vec<_> = state.chats.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl UserStore for MemoryStore {
    async fn create_user(&self, user: &User) -> StoreResult<UserId> {
        let mut state = self.state.write().await;
        state.check(StoreOp::CreateUser, user.id.as_str())?;

        let taken = state.users.contains_key(&user.id)
            || state.users.values().any(|u| u.username == user.username);
        if taken {
            return Err(StoreError::Duplicate {
                entity: Entity::User,
                detail: format!("username {}", user.username),
            });
        }

        state.users.insert(user.id.clone(), user.clone());
        Ok(user.id.clone())
    }

    async fn find_user(&self, id: &UserId) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        state.check(StoreOp::FindUser, id.as_str())?;
        Ok(state.users.get(id).cloned())
    }

    async fn find_by_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> StoreResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|u| u.username == username && u.password == password)
            .cloned())
    }

    async fn add_chat_to_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::AddChatToIndex, id.as_str())?;
        state.user_mut(id)?.chat_ids.insert(chat_id.clone());
        Ok(())
    }

    async fn remove_chat_from_index(&self, id: &UserId, chat_id: &ChatId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::RemoveChatFromIndex, id.as_str())?;
        state.user_mut(id)?.chat_ids.remove(chat_id);
        Ok(())
    }

    async fn chat_index(&self, id: &UserId) -> StoreResult<BTreeSet<ChatId>> {
        let state = self.state.read().await;
        state
            .users
            .get(id)
            .map(|user| user.chat_ids.clone())
            .ok_or_else(|| StoreError::not_found(Entity::User, id))
    }

    async fn add_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::AddContact, id.as_str())?;
        if !state.users.contains_key(contact) {
            return Err(StoreError::not_found(Entity::User, contact));
        }
        state.user_mut(id)?.contacts.insert(contact.clone());
        Ok(())
    }

    async fn remove_contact(&self, id: &UserId, contact: &UserId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::RemoveContact, id.as_str())?;
        state.user_mut(id)?.contacts.remove(contact);
        Ok(())
    }

    async fn list_user_ids(&self) -> StoreResult<Vec<UserId>> {
        let state = self.state.read().await;
        let mut ids: Vec<_> = state.users.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

impl MessageStore for MemoryStore {
    async fn create_message(&self, message: &Message) -> StoreResult<MessageId> {
        let mut state = self.state.write().await;
        state.check(StoreOp::CreateMessage, message.chat_id.as_str())?;

        let id = if message.id.is_blank() {
            MessageId::generate()
        } else {
            message.id.clone()
        };
        let mut stored = message.clone();
        stored.id = id.clone();
        let seq = state.next_message_seq;
        state.next_message_seq += 1;
        state.messages.insert(id.clone(), (seq, stored));
        Ok(id)
    }

    async fn find_message(&self, id: &MessageId) -> StoreResult<Option<Message>> {
        let state = self.state.read().await;
        Ok(state.messages.get(id).map(|(_, m)| m.clone()))
    }

    async fn delete_message(&self, id: &MessageId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::DeleteMessage, id.as_str())?;
        state
            .messages
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Entity::Message, id))
    }

    async fn list_by_chat(&self, chat_id: &ChatId) -> StoreResult<Vec<Message>> {
        let state = self.state.read().await;
        let mut messages: Vec<_> = state
            .messages
            .values()
            .filter(|(_, m)| &m.chat_id == chat_id)
            .cloned()
            .collect();
        messages.sort_by_key(|(seq, _)| *seq);
        Ok(messages.into_iter().map(|(_, m)| m).collect())
    }
}

impl SessionStore for MemoryStore {
    async fn create_session(&self, session: &Session, ttl: Duration) -> StoreResult<Session> {
        let mut state = self.state.write().await;
        state.check(StoreOp::CreateSession, session.user_id.as_str())?;
        if state.sessions.contains_key(&session.id) {
            return Err(StoreError::Duplicate {
                entity: Entity::Session,
                detail: session.id.to_string(),
            });
        }

        let mut stored = session.clone();
        stored.expires_at = expiry_after(Utc::now(), ttl);
        state.sessions.insert(stored.id.clone(), stored.clone());
        Ok(stored)
    }

    async fn find_session(&self, id: &SessionId) -> StoreResult<Option<Session>> {
        let state = self.state.read().await;
        let now = Utc::now();
        Ok(state
            .sessions
            .get(id)
            .filter(|s| !s.is_expired_at(now))
            .cloned())
    }

    async fn find_by_user(&self, user_id: &UserId) -> StoreResult<Vec<Session>> {
        let state = self.state.read().await;
        let now = Utc::now();
        let mut sessions: Vec<_> = state
            .sessions
            .values()
            .filter(|s| &s.user_id == user_id && !s.is_expired_at(now))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(sessions)
    }

    async fn add_chat_mapping(
        &self,
        id: &SessionId,
        name: &str,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateSession, id.as_str())?;
        let session = state.live_session_mut(id)?;
        session.insert_chat(name, chat_id.clone(), role);
        Ok(session.clone())
    }

    async fn remove_chat_mapping(&self, id: &SessionId, chat_id: &ChatId) -> StoreResult<Session> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateSession, id.as_str())?;
        let session = state.live_session_mut(id)?;
        session.remove_chat(chat_id);
        Ok(session.clone())
    }

    async fn update_chat_role(
        &self,
        id: &SessionId,
        chat_id: &ChatId,
        role: Role,
    ) -> StoreResult<Session> {
        let mut state = self.state.write().await;
        state.check(StoreOp::UpdateSession, id.as_str())?;
        let session = state.live_session_mut(id)?;
        if !session.set_role(chat_id, role) {
            return Err(StoreError::not_found(Entity::ChatMapping, chat_id));
        }
        Ok(session.clone())
    }

    async fn delete_session(&self, id: &SessionId) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state.check(StoreOp::DeleteSession, id.as_str())?;
        state
            .sessions
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(Entity::Session, id))
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let mut state = self.state.write().await;
        let now = Utc::now();
        let before = state.sessions.len();
        state.sessions.retain(|_, s| !s.is_expired_at(now));
        Ok((before - state.sessions.len()) as u64)
    }
}
