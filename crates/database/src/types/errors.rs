//! Error types for the storage layer and the shared error taxonomy.

use std::fmt;
use thiserror::Error;

/// Closed taxonomy every error in the workspace maps onto.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    MissingField,
    NotFound,
    DuplicateChat,
    DuplicateChatName,
    DuplicateUser,
    WrongLoginInfo,
    NotAMember,
    InvalidChatReference,
    Unauthorized,
    OperationFailed,
}

impl ErrorKind {
    /// Status code a request-facing layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self {
            ErrorKind::MissingField => 400,
            ErrorKind::WrongLoginInfo => 401,
            ErrorKind::NotAMember | ErrorKind::InvalidChatReference | ErrorKind::Unauthorized => {
                403
            }
            ErrorKind::NotFound => 404,
            ErrorKind::DuplicateChat | ErrorKind::DuplicateChatName | ErrorKind::DuplicateUser => {
                409
            }
            ErrorKind::OperationFailed => 500,
        }
    }
}

/// Aggregate or record a store error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Entity {
    Chat,
    User,
    Message,
    Session,
    ChatMapping,
}

impl Entity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Entity::Chat => "chat",
            Entity::User => "user",
            Entity::Message => "message",
            Entity::Session => "session",
            Entity::ChatMapping => "chat mapping",
        }
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: Entity, id: String },

    #[error("duplicate {entity}: {detail}")]
    Duplicate { entity: Entity, detail: String },

    #[error("database error: {0}")]
    Database(String),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl fmt::Display) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Maps a driver error, turning unique-constraint violations into `Duplicate`.
    pub fn from_sqlx(entity: Entity, err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return Self::Duplicate {
                    entity,
                    detail: db_err.message().to_string(),
                };
            }
        }
        Self::Database(err.to_string())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::NotFound { .. } => ErrorKind::NotFound,
            StoreError::Duplicate {
                entity: Entity::Chat,
                ..
            } => ErrorKind::DuplicateChat,
            StoreError::Duplicate {
                entity: Entity::User,
                ..
            } => ErrorKind::DuplicateUser,
            StoreError::Duplicate { .. } | StoreError::Database(_) => ErrorKind::OperationFailed,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}
