//! Shared types for the users crate

pub mod errors;

pub use errors::{SessionError, UserError};

pub type UserResult<T> = Result<T, UserError>;
pub type SessionResult<T> = Result<T, SessionError>;
