//! Chat entity definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::ids::{ChatId, UserId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    pub id: ChatId,
    pub name: String,
    pub owner: UserId,
    pub admins: BTreeSet<UserId>,
    pub members: BTreeSet<UserId>,
    pub chat_type: ChatType,
    pub created_at: Option<DateTime<Utc>>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Chat {
    /// A new, not yet persisted chat whose only member is its owner.
    pub fn new(name: impl Into<String>, owner: UserId, chat_type: ChatType) -> Self {
        let mut members = BTreeSet::new();
        members.insert(owner.clone());
        Self {
            id: ChatId::default(),
            name: name.into(),
            owner,
            admins: BTreeSet::new(),
            members,
            chat_type,
            created_at: Some(Utc::now()),
            deleted_at: None,
        }
    }

    pub fn with_members<I>(mut self, members: I) -> Self
    where
        I: IntoIterator<Item = UserId>,
    {
        self.members.extend(members);
        self
    }

    pub fn is_member(&self, user_id: &UserId) -> bool {
        self.members.contains(user_id)
    }

    pub fn is_admin(&self, user_id: &UserId) -> bool {
        self.admins.contains(user_id)
    }

    pub fn is_owner(&self, user_id: &UserId) -> bool {
        &self.owner == user_id
    }

    /// Name of the first required field that is missing.
    ///
    /// `require_id` is false for chats that have not been stored yet.
    pub fn first_missing_field(&self, require_id: bool) -> Option<&'static str> {
        if require_id && self.id.is_blank() {
            return Some("id");
        }
        if self.name.trim().is_empty() {
            return Some("name");
        }
        if self.owner.is_blank() {
            return Some("owner");
        }
        if self.members.is_empty() {
            return Some("members");
        }
        if self.created_at.is_none() {
            return Some("created_at");
        }
        None
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
}

impl ChatType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatType::Private => "private",
            ChatType::Group => "group",
        }
    }
}

impl From<&str> for ChatType {
    fn from(s: &str) -> Self {
        match s {
            "group" => ChatType::Group,
            _ => ChatType::Private,
        }
    }
}

impl std::fmt::Display for ChatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_chat_contains_its_owner() {
        let chat = Chat::new("team", UserId::new("alice"), ChatType::Group);
        assert!(chat.is_member(&UserId::new("alice")));
        assert!(chat.is_owner(&UserId::new("alice")));
        assert!(!chat.is_admin(&UserId::new("alice")));
        assert!(chat.id.is_blank());
    }

    #[test]
    fn members_are_a_set() {
        let chat = Chat::new("team", UserId::new("alice"), ChatType::Group)
            .with_members([UserId::new("bob"), UserId::new("alice"), UserId::new("bob")]);
        assert_eq!(chat.members.len(), 2);
    }

    #[test]
    fn reports_first_missing_field() {
        let mut chat = Chat::new("", UserId::new("alice"), ChatType::Private);
        assert_eq!(chat.first_missing_field(false), Some("name"));
        assert_eq!(chat.first_missing_field(true), Some("id"));

        chat.name = "general".into();
        chat.created_at = None;
        assert_eq!(chat.first_missing_field(false), Some("created_at"));

        chat.created_at = Some(Utc::now());
        chat.members.clear();
        assert_eq!(chat.first_missing_field(false), Some("members"));
    }
}
