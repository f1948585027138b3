//! Error types for the user and session services.

use parley_database::{ChatId, Entity, ErrorKind, SessionId, StoreError, UserId};
use thiserror::Error;

/// User-related errors
#[derive(Debug, Error)]
pub enum UserError {
    #[error("missing required fields: {}", .0.join(", "))]
    MissingField(Vec<&'static str>),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("username already taken: {0}")]
    DuplicateUser(String),

    #[error("wrong username or password")]
    WrongLoginInfo,

    #[error("{operation} failed: {source}")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl UserError {
    pub fn missing(field: &'static str) -> Self {
        Self::MissingField(vec![field])
    }

    /// Wraps a store error raised while running `operation`.
    pub fn store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                entity: Entity::User,
                id,
            } => Self::UserNotFound(UserId::from(id)),
            StoreError::Duplicate {
                entity: Entity::User,
                detail,
            } => Self::DuplicateUser(detail),
            source => Self::OperationFailed { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            UserError::MissingField(_) => ErrorKind::MissingField,
            UserError::UserNotFound(_) => ErrorKind::NotFound,
            UserError::DuplicateUser(_) => ErrorKind::DuplicateUser,
            UserError::WrongLoginInfo => ErrorKind::WrongLoginInfo,
            UserError::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }
}

/// Session-related errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("session {session_id} does not map chat {chat_id}")]
    ChatNotMapped { session_id: SessionId, chat_id: ChatId },

    #[error("{operation} failed: {source}")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl SessionError {
    pub fn store(operation: &'static str, session_id: &SessionId, err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                entity: Entity::Session,
                ..
            } => Self::SessionNotFound(session_id.clone()),
            StoreError::NotFound {
                entity: Entity::ChatMapping,
                id,
            } => Self::ChatNotMapped {
                session_id: session_id.clone(),
                chat_id: ChatId::from(id),
            },
            source => Self::OperationFailed { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            SessionError::MissingField(_) => ErrorKind::MissingField,
            SessionError::SessionNotFound(_) => ErrorKind::NotFound,
            SessionError::ChatNotMapped { .. } => ErrorKind::NotAMember,
            SessionError::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_are_listed_together() {
        let err = UserError::MissingField(vec!["username", "email"]);
        assert_eq!(err.to_string(), "missing required fields: username, email");
        assert_eq!(err.kind().http_status(), 400);
    }

    #[test]
    fn store_errors_translate_by_entity() {
        let err = UserError::store("login", StoreError::not_found(Entity::User, "u1"));
        assert!(matches!(err, UserError::UserNotFound(ref id) if id.as_str() == "u1"));

        let err = UserError::store("login", StoreError::Database("disk full".into()));
        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert_eq!(err.to_string(), "login failed: database error: disk full");
    }

    #[test]
    fn missing_mapping_is_not_a_member() {
        let session_id = SessionId::new("s1");
        let err = SessionError::store(
            "update_chat_role",
            &session_id,
            StoreError::not_found(Entity::ChatMapping, "c1"),
        );
        assert_eq!(err.kind(), ErrorKind::NotAMember);
    }
}
