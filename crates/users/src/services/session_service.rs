//! Session service guarding the session store.

use std::time::Duration;

use parley_database::{ChatId, Role, Session, SessionId, SessionStore, UserId};
use tracing::{debug, info};

use crate::types::{SessionError, SessionResult};

/// Service for managing session operations
#[derive(Clone)]
pub struct SessionService<S> {
    sessions: S,
}

impl<S> SessionService<S>
where
    S: SessionStore,
{
    pub fn new(sessions: S) -> Self {
        Self { sessions }
    }

    pub async fn create_session(&self, session: Session, ttl: Duration) -> SessionResult<Session> {
        if session.id.is_blank() {
            return Err(SessionError::MissingField("id"));
        }
        if session.user_id.is_blank() {
            return Err(SessionError::MissingField("user_id"));
        }

        let stored = self
            .sessions
            .create_session(&session, ttl)
            .await
            .map_err(|e| SessionError::store("create_session", &session.id, e))?;

        info!(session_id = %stored.id, user_id = %stored.user_id, expires_at = %stored.expires_at, "opened session");
        Ok(stored)
    }

    pub async fn get_session(&self, id: &SessionId) -> SessionResult<Session> {
        Self::require_session_id(id)?;
        self.sessions
            .find_session(id)
            .await
            .map_err(|e| SessionError::store("get_session", id, e))?
            .ok_or_else(|| SessionError::SessionNotFound(id.clone()))
    }

    /// Live sessions of a user.
    pub async fn sessions_for_user(&self, user_id: &UserId) -> SessionResult<Vec<Session>> {
        if user_id.is_blank() {
            return Err(SessionError::MissingField("user_id"));
        }
        self.sessions
            .find_by_user(user_id)
            .await
            .map_err(|e| SessionError::OperationFailed {
                operation: "sessions_for_user",
                source: e,
            })
    }

    pub async fn add_chat(
        &self,
        id: &SessionId,
        name: &str,
        chat_id: &ChatId,
        role: Role,
    ) -> SessionResult<Session> {
        Self::require_session_id(id)?;
        if name.trim().is_empty() {
            return Err(SessionError::MissingField("chat_name"));
        }
        Self::require_chat_id(chat_id)?;

        let session = self
            .sessions
            .add_chat_mapping(id, name, chat_id, role)
            .await
            .map_err(|e| SessionError::store("add_chat", id, e))?;

        debug!(session_id = %id, chat_id = %chat_id, name, version = session.version, "session chat added");
        Ok(session)
    }

    pub async fn remove_chat(&self, id: &SessionId, chat_id: &ChatId) -> SessionResult<Session> {
        Self::require_session_id(id)?;
        Self::require_chat_id(chat_id)?;
        self.sessions
            .remove_chat_mapping(id, chat_id)
            .await
            .map_err(|e| SessionError::store("remove_chat", id, e))
    }

    pub async fn update_chat_role(
        &self,
        id: &SessionId,
        chat_id: &ChatId,
        role: Role,
    ) -> SessionResult<Session> {
        Self::require_session_id(id)?;
        Self::require_chat_id(chat_id)?;
        self.sessions
            .update_chat_role(id, chat_id, role)
            .await
            .map_err(|e| SessionError::store("update_chat_role", id, e))
    }

    /// Role cached in the session for `chat_id`.
    pub async fn role_in_chat(&self, id: &SessionId, chat_id: &ChatId) -> SessionResult<Role> {
        Self::require_chat_id(chat_id)?;
        let session = self.get_session(id).await?;
        session
            .entry_for(chat_id)
            .map(|(_, entry)| entry.role)
            .ok_or_else(|| SessionError::ChatNotMapped {
                session_id: id.clone(),
                chat_id: chat_id.clone(),
            })
    }

    pub async fn delete_session(&self, id: &SessionId) -> SessionResult<()> {
        Self::require_session_id(id)?;
        self.sessions
            .delete_session(id)
            .await
            .map_err(|e| SessionError::store("delete_session", id, e))?;
        info!(session_id = %id, "closed session");
        Ok(())
    }

    pub async fn purge_expired(&self) -> SessionResult<u64> {
        self.sessions
            .purge_expired()
            .await
            .map_err(|e| SessionError::OperationFailed {
                operation: "purge_expired",
                source: e,
            })
    }

    fn require_session_id(id: &SessionId) -> SessionResult<()> {
        if id.is_blank() {
            return Err(SessionError::MissingField("session_id"));
        }
        Ok(())
    }

    fn require_chat_id(chat_id: &ChatId) -> SessionResult<()> {
        if chat_id.is_blank() {
            return Err(SessionError::MissingField("chat_id"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::{ErrorKind, MemoryStore, StoreOp};

    const TTL: Duration = Duration::from_secs(3600);

    async fn open(service: &SessionService<MemoryStore>, user: &str) -> Session {
        service
            .create_session(Session::new(UserId::new(user)), TTL)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_stamps_expiry_from_ttl() {
        let service = SessionService::new(MemoryStore::new());
        let session = open(&service, "alice").await;

        assert!(session.expires_at > session.created_at);
        assert_eq!(service.get_session(&session.id).await.unwrap(), session);
    }

    #[tokio::test]
    async fn blank_keys_fail_before_the_store() {
        let store = MemoryStore::new();
        store.inject_failure(StoreOp::UpdateSession, None).await;
        let service = SessionService::new(store);

        let err = service
            .add_chat(&SessionId::new("s1"), " ", &ChatId::new("c1"), Role::Normal)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::MissingField("chat_name")));

        let err = service.get_session(&SessionId::default()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingField);

        let anonymous = Session::new(UserId::default());
        let err = service.create_session(anonymous, TTL).await.unwrap_err();
        assert!(matches!(err, SessionError::MissingField("user_id")));
    }

    #[tokio::test]
    async fn cached_role_follows_mutations() {
        let service = SessionService::new(MemoryStore::new());
        let session = open(&service, "alice").await;
        let chat = ChatId::new("c1");

        service.add_chat(&session.id, "team", &chat, Role::Normal).await.unwrap();
        assert_eq!(service.role_in_chat(&session.id, &chat).await.unwrap(), Role::Normal);

        let updated = service
            .update_chat_role(&session.id, &chat, Role::Admin)
            .await
            .unwrap();
        assert_eq!(updated.version, 2);
        assert_eq!(service.role_in_chat(&session.id, &chat).await.unwrap(), Role::Admin);

        service.remove_chat(&session.id, &chat).await.unwrap();
        let err = service.role_in_chat(&session.id, &chat).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAMember);
    }

    #[tokio::test]
    async fn missing_sessions_are_reported_by_id() {
        let service = SessionService::new(MemoryStore::new());
        let ghost = SessionId::new("ghost");

        assert!(matches!(
            service.get_session(&ghost).await,
            Err(SessionError::SessionNotFound(ref id)) if id == &ghost
        ));
        assert!(matches!(
            service.add_chat(&ghost, "team", &ChatId::new("c1"), Role::Owner).await,
            Err(SessionError::SessionNotFound(_))
        ));
        assert!(matches!(
            service.delete_session(&ghost).await,
            Err(SessionError::SessionNotFound(_))
        ));
    }

    #[tokio::test]
    async fn store_failures_carry_the_operation_name() {
        let store = MemoryStore::new();
        let service = SessionService::new(store.clone());
        let session = open(&service, "alice").await;
        store.inject_failure(StoreOp::UpdateSession, None).await;

        let err = service
            .add_chat(&session.id, "team", &ChatId::new("c1"), Role::Owner)
            .await
            .unwrap_err();
        assert!(matches!(err, SessionError::OperationFailed { operation: "add_chat", .. }));
    }

    #[tokio::test]
    async fn lists_and_deletes_user_sessions() {
        let service = SessionService::new(MemoryStore::new());
        let first = open(&service, "alice").await;
        let second = open(&service, "alice").await;
        open(&service, "bob").await;

        let ids: Vec<_> = service
            .sessions_for_user(&UserId::new("alice"))
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&first.id) && ids.contains(&second.id));

        service.delete_session(&first.id).await.unwrap();
        assert_eq!(service.purge_expired().await.unwrap(), 0);
        assert_eq!(service.sessions_for_user(&UserId::new("alice")).await.unwrap().len(), 1);
    }
}
