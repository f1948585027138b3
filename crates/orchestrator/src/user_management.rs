//! Account workflows: registration, login, logout and contacts.

use std::time::Duration;

use parley_chats::{role_of, ChatService};
use parley_database::{
    ChatStore, NewUser, Session, SessionChat, SessionId, SessionStore, User, UserId, UserStore,
};
use parley_users::{SessionService, UserService};
use tracing::{info, warn};

use crate::error::WorkflowResult;

pub struct UserManagement<C, U, S> {
    users: UserService<U>,
    chats: ChatService<C, U>,
    sessions: SessionService<S>,
    session_ttl: Duration,
}

impl<C, U, S> UserManagement<C, U, S>
where
    C: ChatStore,
    U: UserStore,
    S: SessionStore,
{
    pub fn new(
        users: UserService<U>,
        chats: ChatService<C, U>,
        sessions: SessionService<S>,
        session_ttl: Duration,
    ) -> Self {
        Self {
            users,
            chats,
            sessions,
            session_ttl,
        }
    }

    /// Registers a user under a freshly minted id and opens an empty session.
    pub async fn register(&self, mut new_user: NewUser) -> WorkflowResult<Session> {
        new_user.id = UserId::generate();
        let user_id = self.users.register(new_user).await?;
        let session = self
            .sessions
            .create_session(Session::new(user_id), self.session_ttl)
            .await?;
        Ok(session)
    }

    /// Authenticates and opens a session mapping every chat in the user's
    /// chat index. Chats that cannot be loaded, or that no longer list the
    /// user, are skipped.
    pub async fn login(&self, username: &str, password: &str) -> WorkflowResult<Session> {
        let user = self.users.login(username, password).await?;
        let chat_ids = self.users.get_chat_id_list(&user.id).await?;

        let mut session = Session::new(user.id.clone());
        for chat_id in &chat_ids {
            let chat = match self.chats.find_chat(chat_id).await {
                Ok(chat) => chat,
                Err(err) => {
                    warn!(user_id = %user.id, chat_id = %chat_id, error = %err, "skipping chat at login");
                    continue;
                }
            };

            if !chat.is_member(&user.id) {
                warn!(user_id = %user.id, chat_id = %chat_id, "chat index entry without membership");
                continue;
            }
            if session.chats.contains_key(&chat.name) {
                warn!(user_id = %user.id, chat_id = %chat_id, name = %chat.name, "chat name already mapped at login");
                continue;
            }

            let role = role_of(&chat, &user.id);
            session.chats.insert(
                chat.name,
                SessionChat {
                    chat_id: chat_id.clone(),
                    role,
                },
            );
        }

        let session = self
            .sessions
            .create_session(session, self.session_ttl)
            .await?;

        info!(user_id = %user.id, session_id = %session.id, chats = session.chats.len(), "user logged in");
        Ok(session)
    }

    pub async fn logout(&self, session_id: &SessionId) -> WorkflowResult<()> {
        Ok(self.sessions.delete_session(session_id).await?)
    }

    pub async fn profile(&self, session_id: &SessionId) -> WorkflowResult<User> {
        let session = self.sessions.get_session(session_id).await?;
        Ok(self.users.get_user_info(&session.user_id).await?)
    }

    pub async fn add_contact(&self, session_id: &SessionId, contact: &UserId) -> WorkflowResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        Ok(self.users.add_contact(&session.user_id, contact).await?)
    }

    pub async fn remove_contact(
        &self,
        session_id: &SessionId,
        contact: &UserId,
    ) -> WorkflowResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        Ok(self.users.remove_contact(&session.user_id, contact).await?)
    }
}
