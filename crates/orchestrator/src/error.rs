use parley_chats::ChatError;
use parley_database::ErrorKind;
use parley_users::{SessionError, UserError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error(transparent)]
    Chat(#[from] ChatError),
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("session already maps a chat named `{0}`")]
    DuplicateChatName(String),
}

impl WorkflowError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkflowError::Chat(err) => err.kind(),
            WorkflowError::User(err) => err.kind(),
            WorkflowError::Session(err) => err.kind(),
            WorkflowError::DuplicateChatName(_) => ErrorKind::DuplicateChatName,
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
