//! Repair pass for the chat/user membership invariant.
//!
//! A chat lists a user as a member exactly when that user's chat index lists
//! the chat. Partial membership writes break this; the sweep below restores
//! it from the chat side, which is authoritative.

use std::collections::{BTreeSet, HashMap};

use parley_database::{ChatId, ChatStore, UserId, UserStore};
use tracing::{info, warn};

use super::chat_service::ChatService;
use crate::types::{ChatError, ChatResult};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Index entries added for members missing them.
    pub added: usize,
    /// Index entries removed because the chat is gone or no longer lists the user.
    pub removed: usize,
    /// Members that do not resolve to a user.
    pub unknown_members: usize,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.added == 0 && self.removed == 0
    }
}

impl<C, U> ChatService<C, U>
where
    C: ChatStore,
    U: UserStore,
{
    /// Sweeps all chats and users and fixes reverse-index drift. Idempotent.
    pub async fn reconcile_memberships(&self) -> ChatResult<ReconcileReport> {
        let mut report = ReconcileReport::default();

        let chat_ids = self
            .chats
            .list_chat_ids()
            .await
            .map_err(|e| ChatError::store("reconcile_memberships", e))?;

        let mut members_by_chat: HashMap<ChatId, BTreeSet<UserId>> = HashMap::new();
        for chat_id in chat_ids {
            match self.chats.find_chat(&chat_id).await {
                Ok(Some(chat)) => {
                    members_by_chat.insert(chat_id, chat.members);
                }
                Ok(None) => {}
                Err(e) => return Err(ChatError::store("reconcile_memberships", e)),
            }
        }

        let user_ids = self
            .users
            .list_user_ids()
            .await
            .map_err(|e| ChatError::store("reconcile_memberships", e))?;
        let known: BTreeSet<UserId> = user_ids.iter().cloned().collect();

        for user_id in &user_ids {
            let index = self
                .users
                .chat_index(user_id)
                .await
                .map_err(|e| ChatError::store("reconcile_memberships", e))?;

            for chat_id in &index {
                let listed = members_by_chat
                    .get(chat_id)
                    .is_some_and(|members| members.contains(user_id));
                if !listed {
                    self.users
                        .remove_chat_from_index(user_id, chat_id)
                        .await
                        .map_err(|e| ChatError::store("reconcile_memberships", e))?;
                    report.removed += 1;
                    info!(user_id = %user_id, chat_id = %chat_id, "removed stale chat index entry");
                }
            }

            for (chat_id, members) in &members_by_chat {
                if members.contains(user_id) && !index.contains(chat_id) {
                    self.users
                        .add_chat_to_index(user_id, chat_id)
                        .await
                        .map_err(|e| ChatError::store("reconcile_memberships", e))?;
                    report.added += 1;
                    info!(user_id = %user_id, chat_id = %chat_id, "added missing chat index entry");
                }
            }
        }

        for (chat_id, members) in &members_by_chat {
            for member in members.iter().filter(|m| !known.contains(*m)) {
                warn!(chat_id = %chat_id, user_id = %member, "chat lists an unknown user");
                report.unknown_members += 1;
            }
        }

        info!(
            added = report.added,
            removed = report.removed,
            unknown_members = report.unknown_members,
            "membership reconciliation finished"
        );
        Ok(report)
    }
}
