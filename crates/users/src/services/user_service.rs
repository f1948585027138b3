//! User service for registration, login and contact management.

use std::collections::BTreeSet;

use parley_database::{ChatId, NewUser, StoreError, User, UserId, UserStore};
use tracing::info;

use crate::types::{UserError, UserResult};

/// Service for managing user operations
#[derive(Clone)]
pub struct UserService<U> {
    users: U,
}

impl<U> UserService<U>
where
    U: UserStore,
{
    pub fn new(users: U) -> Self {
        Self { users }
    }

    /// Validates every field, then stores the user.
    pub async fn register(&self, new_user: NewUser) -> UserResult<UserId> {
        let user = new_user.into_user().map_err(UserError::MissingField)?;

        let id = self
            .users
            .create_user(&user)
            .await
            .map_err(|e| match e {
                StoreError::Duplicate { .. } => {
                    UserError::DuplicateUser(user.username.clone())
                }
                other => UserError::store("register", other),
            })?;

        info!(user_id = %id, username = %user.username, "registered user");
        Ok(id)
    }

    /// Exact match on username and password.
    pub async fn login(&self, username: &str, password: &str) -> UserResult<User> {
        let mut missing = Vec::new();
        if username.trim().is_empty() {
            missing.push("username");
        }
        if password.is_empty() {
            missing.push("password");
        }
        if !missing.is_empty() {
            return Err(UserError::MissingField(missing));
        }

        self.users
            .find_by_credentials(username, password)
            .await
            .map_err(|e| UserError::store("login", e))?
            .ok_or(UserError::WrongLoginInfo)
    }

    pub async fn get_user_info(&self, user_id: &UserId) -> UserResult<User> {
        Self::require_id(user_id, "user_id")?;
        self.users
            .find_user(user_id)
            .await
            .map_err(|e| UserError::store("get_user_info", e))?
            .ok_or_else(|| UserError::UserNotFound(user_id.clone()))
    }

    /// Chats the user is a member of, according to the reverse index.
    pub async fn get_chat_id_list(&self, user_id: &UserId) -> UserResult<BTreeSet<ChatId>> {
        Self::require_id(user_id, "user_id")?;
        self.users
            .chat_index(user_id)
            .await
            .map_err(|e| UserError::store("get_chat_id_list", e))
    }

    pub async fn add_contact(&self, user_id: &UserId, contact: &UserId) -> UserResult<()> {
        Self::require_id(user_id, "user_id")?;
        Self::require_id(contact, "contact")?;
        self.users
            .add_contact(user_id, contact)
            .await
            .map_err(|e| UserError::store("add_contact", e))
    }

    pub async fn remove_contact(&self, user_id: &UserId, contact: &UserId) -> UserResult<()> {
        Self::require_id(user_id, "user_id")?;
        Self::require_id(contact, "contact")?;
        self.users
            .remove_contact(user_id, contact)
            .await
            .map_err(|e| UserError::store("remove_contact", e))
    }

    fn require_id(id: &UserId, field: &'static str) -> UserResult<()> {
        if id.is_blank() {
            return Err(UserError::missing(field));
        }
        Ok(())
    }
}
