//! Domain entities shared by the stores and services

pub mod chat;
pub mod ids;
pub mod message;
pub mod role;
pub mod session;
pub mod user;

pub use chat::{Chat, ChatType};
pub use ids::{ChatId, MessageId, SessionId, UserId};
pub use message::Message;
pub use role::{Capability, Role, UnknownRole};
pub use session::{expiry_after, Session, SessionChat};
pub use user::{Gender, NewUser, User};
