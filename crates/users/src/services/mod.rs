//! Service layer for users and sessions

pub mod session_service;
pub mod user_service;

pub use session_service::SessionService;
pub use user_service::UserService;
