//! Chat workflows authorized against the caller's session.

use std::collections::BTreeSet;

use parley_chats::{ChatError, ChatService, DeleteOutcome};
use parley_database::{
    Capability, Chat, ChatId, ChatStore, ChatType, Message, Role, Session, SessionId,
    SessionStore, UserId, UserStore,
};
use parley_users::SessionService;
use tracing::{info, warn};

use crate::error::{WorkflowError, WorkflowResult};

pub struct ChatManagement<C, U, S> {
    chats: ChatService<C, U>,
    sessions: SessionService<S>,
}

impl<C, U, S> ChatManagement<C, U, S>
where
    C: ChatStore,
    U: UserStore,
    S: SessionStore,
{
    pub fn new(chats: ChatService<C, U>, sessions: SessionService<S>) -> Self {
        Self { chats, sessions }
    }

    /// Creates a chat owned by the session's user and maps it into that session.
    ///
    /// Other initial members get the chat mapped into their live sessions.
    pub async fn create_chat(
        &self,
        session_id: &SessionId,
        name: &str,
        chat_type: ChatType,
        members: Vec<UserId>,
    ) -> WorkflowResult<ChatId> {
        let session = self.sessions.get_session(session_id).await?;
        if session.chat_id(name).is_some() {
            return Err(WorkflowError::DuplicateChatName(name.to_string()));
        }

        let chat = Chat::new(name, session.user_id.clone(), chat_type).with_members(members);
        let others: Vec<UserId> = chat
            .members
            .iter()
            .filter(|m| **m != session.user_id)
            .cloned()
            .collect();

        let chat_id = self.chats.store_chat(&chat).await?;
        self.sessions
            .add_chat(session_id, name, &chat_id, Role::Owner)
            .await?;

        // The chat stays reachable from the caller's session even when
        // indexing fails; reconciliation repairs the index.
        let indexed = self.chats.index_members(&chat, &chat_id).await;
        self.map_into_sessions(&others, name, &chat_id).await;
        indexed?;

        info!(chat_id = %chat_id, owner = %session.user_id, name, "chat created via session");
        Ok(chat_id)
    }

    pub async fn find_chat(&self, session_id: &SessionId, chat_id: &ChatId) -> WorkflowResult<Chat> {
        let session = self.sessions.get_session(session_id).await?;
        let (chat, _) = self
            .chats
            .authorize(&session, chat_id, Capability::ReadChat)
            .await?;
        Ok(chat)
    }

    pub async fn get_members(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
    ) -> WorkflowResult<BTreeSet<UserId>> {
        let session = self.sessions.get_session(session_id).await?;
        self.chats
            .authorize(&session, chat_id, Capability::ReadChat)
            .await?;
        Ok(self.chats.get_members(chat_id).await?)
    }

    /// Messages of the chat the session maps under `chat_name`.
    pub async fn get_messages(
        &self,
        session_id: &SessionId,
        chat_name: &str,
    ) -> WorkflowResult<Vec<Message>> {
        let session = self.sessions.get_session(session_id).await?;
        let chat_id = Self::mapped_id(&session, chat_name)?;
        self.chats
            .authorize(&session, &chat_id, Capability::ReadChat)
            .await?;
        Ok(self.chats.get_messages(&chat_id).await?)
    }

    /// Renames a chat. Only the caller's own session is remapped; other
    /// members keep the old name until they log in again.
    pub async fn update_chat_name(
        &self,
        session_id: &SessionId,
        current: &str,
        next: &str,
    ) -> WorkflowResult<Chat> {
        if next.trim().is_empty() {
            return Err(ChatError::MissingField("name").into());
        }

        let session = self.sessions.get_session(session_id).await?;
        let chat_id = Self::mapped_id(&session, current)?;
        let (mut chat, role) = self
            .chats
            .authorize(&session, &chat_id, Capability::RenameChat)
            .await?;

        if let Some(other) = session.chat_id(next) {
            if other != &chat_id {
                return Err(WorkflowError::DuplicateChatName(next.to_string()));
            }
        }

        chat.name = next.to_string();
        let updated = self.chats.update_chat_name(&chat).await?;
        self.sessions.add_chat(session_id, next, &chat_id, role).await?;

        info!(chat_id = %chat_id, from = current, to = next, "chat renamed via session");
        Ok(updated)
    }

    pub async fn delete_chat(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
    ) -> WorkflowResult<DeleteOutcome> {
        let session = self.sessions.get_session(session_id).await?;
        self.chats
            .authorize(&session, chat_id, Capability::DeleteChat)
            .await?;

        let outcome = self.chats.delete_chat(chat_id).await?;
        self.sessions.remove_chat(session_id, chat_id).await?;
        Ok(outcome)
    }

    /// Adds users and maps the chat into each added user's live sessions.
    pub async fn add_user(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
        user_ids: &[UserId],
    ) -> WorkflowResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        let (chat, _) = self
            .chats
            .authorize(&session, chat_id, Capability::ManageMembers)
            .await?;

        self.chats.add_user(chat_id, user_ids).await?;
        self.map_into_sessions(user_ids, &chat.name, chat_id).await;
        Ok(())
    }

    /// Removes users and drops the chat from their live sessions. The owner
    /// cannot be removed.
    pub async fn remove_user(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
        user_ids: &[UserId],
    ) -> WorkflowResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        let (chat, role) = self
            .chats
            .authorize(&session, chat_id, Capability::ManageMembers)
            .await?;

        if user_ids.iter().any(|id| chat.is_owner(id)) {
            return Err(ChatError::Unauthorized {
                role,
                capability: Capability::ManageMembers,
            }
            .into());
        }

        self.chats.remove_user(chat_id, user_ids).await?;

        for user_id in user_ids {
            for other in self.live_sessions(user_id).await {
                if let Err(err) = self.sessions.remove_chat(&other.id, chat_id).await {
                    warn!(session_id = %other.id, chat_id = %chat_id, error = %err, "failed to unmap chat from session");
                }
            }
        }
        Ok(())
    }

    /// Promotes users and refreshes the cached role in their sessions.
    pub async fn set_admin(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
        user_ids: &[UserId],
    ) -> WorkflowResult<()> {
        if user_ids.is_empty() {
            return Err(ChatError::MissingField("user_ids").into());
        }

        let session = self.sessions.get_session(session_id).await?;
        self.chats
            .authorize(&session, chat_id, Capability::PromoteAdmin)
            .await?;

        for user_id in user_ids {
            self.chats.set_admin(user_id, chat_id).await?;

            for other in self.live_sessions(user_id).await {
                if !other.maps_chat(chat_id) {
                    continue;
                }
                if let Err(err) = self
                    .sessions
                    .update_chat_role(&other.id, chat_id, Role::Admin)
                    .await
                {
                    warn!(session_id = %other.id, chat_id = %chat_id, error = %err, "failed to refresh cached role");
                }
            }
        }
        Ok(())
    }

    fn mapped_id(session: &Session, name: &str) -> WorkflowResult<ChatId> {
        session.chat_id(name).cloned().ok_or_else(|| {
            ChatError::NotAMember {
                name: name.to_string(),
            }
            .into()
        })
    }

    async fn live_sessions(&self, user_id: &UserId) -> Vec<Session> {
        match self.sessions.sessions_for_user(user_id).await {
            Ok(sessions) => sessions,
            Err(err) => {
                warn!(user_id = %user_id, error = %err, "failed to load sessions");
                Vec::new()
            }
        }
    }

    /// Maps a chat as `Normal` into sessions that do not map it yet.
    /// Offline users pick the chat up from their chat index at next login.
    async fn map_into_sessions(&self, user_ids: &[UserId], name: &str, chat_id: &ChatId) {
        for user_id in user_ids {
            for other in self.live_sessions(user_id).await {
                if other.maps_chat(chat_id) {
                    continue;
                }
                if other.chat_id(name).is_some() {
                    warn!(session_id = %other.id, chat_id = %chat_id, name, "session already maps another chat under this name");
                    continue;
                }
                if let Err(err) = self
                    .sessions
                    .add_chat(&other.id, name, chat_id, Role::Normal)
                    .await
                {
                    warn!(session_id = %other.id, chat_id = %chat_id, error = %err, "failed to map chat into session");
                }
            }
        }
    }
}
