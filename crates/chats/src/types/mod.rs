//! Shared types for the chats crate

pub mod errors;

pub use errors::ChatError;

pub type ChatResult<T> = Result<T, ChatError>;
