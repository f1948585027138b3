//! Parley Chats Crate
//!
//! Chat lifecycle, two-sided membership updates, role resolution and
//! messaging.

pub mod authorization;
pub mod services;
pub mod types;

pub use authorization::{require, resolve_role, role_of};
pub use services::{ChatService, DeleteOutcome, MessageService, ReconcileReport};
pub use types::{ChatError, ChatResult};
