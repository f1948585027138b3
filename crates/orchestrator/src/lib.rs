//! Parley Orchestrator Crate
//!
//! Workflows that load the caller's session, resolve their role and then
//! drive the chat, message, user and session services.

mod chat_management;
mod error;
mod messaging;
mod user_management;

pub use chat_management::ChatManagement;
pub use error::{WorkflowError, WorkflowResult};
pub use messaging::Messaging;
pub use user_management::UserManagement;
