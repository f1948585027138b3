//! Parley Users Crate
//!
//! User registration, login and contact management, plus the session
//! service that owns the per-session chat mappings.

pub mod services;
pub mod types;

pub use services::{SessionService, UserService};
pub use types::{SessionError, SessionResult, UserError, UserResult};
