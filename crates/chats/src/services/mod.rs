//! Service layer for chats and messages

pub mod chat_service;
pub mod message_service;
pub mod reconcile;

pub use chat_service::{ChatService, DeleteOutcome};
pub use message_service::MessageService;
pub use reconcile::ReconcileReport;
