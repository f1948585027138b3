//! Error types for chat operations.

use parley_database::{
    Capability, ChatId, Entity, ErrorKind, MessageId, Role, StoreError, UserId,
};
use thiserror::Error;

/// Chat-related errors
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("chat not found: {0}")]
    ChatNotFound(ChatId),

    #[error("user not found: {0}")]
    UserNotFound(UserId),

    #[error("message not found: {0}")]
    MessageNotFound(MessageId),

    #[error("duplicate chat: {0}")]
    DuplicateChat(String),

    #[error("session does not map chat `{name}`")]
    NotAMember { name: String },

    #[error("chat `{name}` maps to {mapped}, not {requested}")]
    InvalidChatReference {
        name: String,
        mapped: ChatId,
        requested: ChatId,
    },

    #[error("role {role} may not {capability}")]
    Unauthorized { role: Role, capability: Capability },

    #[error("{operation} failed: {source}")]
    OperationFailed {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl ChatError {
    /// Wraps a store error raised while running `operation`.
    pub fn store(operation: &'static str, err: StoreError) -> Self {
        match err {
            StoreError::NotFound {
                entity: Entity::Chat,
                id,
            } => Self::ChatNotFound(ChatId::from(id)),
            StoreError::NotFound {
                entity: Entity::User,
                id,
            } => Self::UserNotFound(UserId::from(id)),
            StoreError::NotFound {
                entity: Entity::Message,
                id,
            } => Self::MessageNotFound(MessageId::from(id)),
            StoreError::Duplicate {
                entity: Entity::Chat,
                detail,
            } => Self::DuplicateChat(detail),
            source => Self::OperationFailed { operation, source },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ChatError::MissingField(_) => ErrorKind::MissingField,
            ChatError::ChatNotFound(_)
            | ChatError::UserNotFound(_)
            | ChatError::MessageNotFound(_) => ErrorKind::NotFound,
            ChatError::DuplicateChat(_) => ErrorKind::DuplicateChat,
            ChatError::NotAMember { .. } => ErrorKind::NotAMember,
            ChatError::InvalidChatReference { .. } => ErrorKind::InvalidChatReference,
            ChatError::Unauthorized { .. } => ErrorKind::Unauthorized,
            ChatError::OperationFailed { .. } => ErrorKind::OperationFailed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_not_found_keeps_the_entity() {
        let err = ChatError::store("add_user", StoreError::not_found(Entity::User, "bob"));
        assert!(matches!(err, ChatError::UserNotFound(ref id) if id.as_str() == "bob"));

        let err = ChatError::store("find_chat", StoreError::not_found(Entity::Chat, "c1"));
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn unauthorized_names_role_and_capability() {
        let err = ChatError::Unauthorized {
            role: Role::Normal,
            capability: Capability::RenameChat,
        };
        assert_eq!(err.to_string(), "role normal may not rename_chat");
        assert_eq!(err.kind().http_status(), 403);
    }
}
