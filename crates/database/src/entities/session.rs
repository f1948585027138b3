//! Login sessions and their chat-name mappings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use super::ids::{ChatId, SessionId, UserId};
use super::role::Role;

/// Chat reference held by a session under a chat name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionChat {
    pub chat_id: ChatId,
    pub role: Role,
}

/// Authenticated session.
///
/// The chat map is a denormalized cache of the user's chats keyed by chat
/// name. It is built at login and only changes through the mutation methods
/// below, each of which bumps `version`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub user_id: UserId,
    pub chats: BTreeMap<String, SessionChat>,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::generate(),
            user_id,
            chats: BTreeMap::new(),
            version: 0,
            created_at: now,
            expires_at: now,
        }
    }

    pub fn chat_id(&self, name: &str) -> Option<&ChatId> {
        self.chats.get(name).map(|entry| &entry.chat_id)
    }

    pub fn chat_names(&self) -> Vec<&str> {
        self.chats.keys().map(String::as_str).collect()
    }

    /// Name and entry under which `chat_id` is mapped.
    pub fn entry_for(&self, chat_id: &ChatId) -> Option<(&str, &SessionChat)> {
        self.chats
            .iter()
            .find(|(_, entry)| &entry.chat_id == chat_id)
            .map(|(name, entry)| (name.as_str(), entry))
    }

    pub fn maps_chat(&self, chat_id: &ChatId) -> bool {
        self.entry_for(chat_id).is_some()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Maps `name` to `chat_id`, dropping any other name the chat was mapped under.
    pub fn insert_chat(&mut self, name: impl Into<String>, chat_id: ChatId, role: Role) {
        let name = name.into();
        self.chats
            .retain(|existing, entry| existing == &name || entry.chat_id != chat_id);
        self.chats.insert(name, SessionChat { chat_id, role });
        self.version += 1;
    }

    pub fn remove_chat(&mut self, chat_id: &ChatId) -> bool {
        let before = self.chats.len();
        self.chats.retain(|_, entry| &entry.chat_id != chat_id);
        let removed = self.chats.len() != before;
        if removed {
            self.version += 1;
        }
        removed
    }

    pub fn set_role(&mut self, chat_id: &ChatId, role: Role) -> bool {
        match self.chats.values_mut().find(|entry| &entry.chat_id == chat_id) {
            Some(entry) => {
                entry.role = role;
                self.version += 1;
                true
            }
            None => false,
        }
    }
}

/// `now + ttl`, saturating at the largest representable instant.
pub fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        Session::new(UserId::new("alice"))
    }

    #[test]
    fn insert_maps_name_and_bumps_version() {
        let mut session = session();
        session.insert_chat("team", ChatId::new("c1"), Role::Owner);

        assert_eq!(session.chat_id("team"), Some(&ChatId::new("c1")));
        assert_eq!(session.chat_names(), vec!["team"]);
        assert_eq!(session.version, 1);
    }

    #[test]
    fn reinserting_a_chat_under_a_new_name_drops_the_old_one() {
        let mut session = session();
        session.insert_chat("team", ChatId::new("c1"), Role::Owner);
        session.insert_chat("squad", ChatId::new("c1"), Role::Owner);

        assert_eq!(session.chat_id("team"), None);
        assert_eq!(session.chat_id("squad"), Some(&ChatId::new("c1")));
        assert_eq!(session.chats.len(), 1);
    }

    #[test]
    fn remove_and_set_role_report_misses_without_bumping() {
        let mut session = session();
        assert!(!session.remove_chat(&ChatId::new("c1")));
        assert!(!session.set_role(&ChatId::new("c1"), Role::Admin));
        assert_eq!(session.version, 0);

        session.insert_chat("team", ChatId::new("c1"), Role::Normal);
        assert!(session.set_role(&ChatId::new("c1"), Role::Admin));
        assert_eq!(session.entry_for(&ChatId::new("c1")).map(|(_, e)| e.role), Some(Role::Admin));
        assert!(session.remove_chat(&ChatId::new("c1")));
        assert!(!session.maps_chat(&ChatId::new("c1")));
        assert_eq!(session.version, 3);
    }

    #[test]
    fn expiry_saturates_for_huge_ttls() {
        let now = Utc::now();
        assert_eq!(expiry_after(now, Duration::from_secs(60)), now + chrono::Duration::seconds(60));
        assert_eq!(expiry_after(now, Duration::MAX), DateTime::<Utc>::MAX_UTC);
    }
}
