//! Chat service: chat lifecycle and membership.
//!
//! Membership lives on two aggregates: the chat's member set and each
//! user's chat index. Every membership change writes the chat first and the
//! users second. Nothing is rolled back when the user side fails; the error
//! is returned and [`ChatService::reconcile_memberships`] repairs the drift.

use std::collections::BTreeSet;

use parley_database::{
    Capability, Chat, ChatId, ChatStore, Message, Role, Session, StoreError, UserId, UserStore,
};
use tracing::{info, warn};

use crate::authorization;
use crate::types::{ChatError, ChatResult};

/// Result of a chat deletion.
#[derive(Debug)]
pub struct DeleteOutcome {
    pub chat: Chat,
    /// Reverse-index entries that could not be removed.
    pub cleanup_failures: Vec<(UserId, StoreError)>,
}

/// Service for chat operations
#[derive(Clone)]
pub struct ChatService<C, U> {
    pub(crate) chats: C,
    pub(crate) users: U,
}

impl<C, U> ChatService<C, U>
where
    C: ChatStore,
    U: UserStore,
{
    pub fn new(chats: C, users: U) -> Self {
        Self { chats, users }
    }

    /// Stores a new chat and indexes it on every initial member.
    pub async fn create_chat(&self, chat: Chat) -> ChatResult<ChatId> {
        let id = self.store_chat(&chat).await?;
        self.index_members(&chat, &id).await?;
        Ok(id)
    }

    /// Validates and stores a new chat without touching any chat index.
    ///
    /// Every initial member must be a registered user; nothing is written
    /// otherwise.
    pub async fn store_chat(&self, chat: &Chat) -> ChatResult<ChatId> {
        if let Some(field) = chat.first_missing_field(false) {
            return Err(ChatError::MissingField(field));
        }

        for member in &chat.members {
            let known = self
                .users
                .find_user(member)
                .await
                .map_err(|e| ChatError::store("create_chat", e))?;
            if known.is_none() {
                return Err(ChatError::UserNotFound(member.clone()));
            }
        }

        let id = self
            .chats
            .create_chat(chat)
            .await
            .map_err(|e| ChatError::store("create_chat", e))?;

        info!(chat_id = %id, name = %chat.name, owner = %chat.owner, "created chat");
        Ok(id)
    }

    /// Indexes a stored chat on its members, owner first.
    pub async fn index_members(&self, chat: &Chat, id: &ChatId) -> ChatResult<()> {
        let (owner, others): (Vec<&UserId>, Vec<&UserId>) =
            chat.members.iter().partition(|m| chat.is_owner(m));

        for member in owner.into_iter().chain(others) {
            self.users
                .add_chat_to_index(member, id)
                .await
                .map_err(|e| ChatError::store("create_chat", e))?;
        }
        Ok(())
    }

    pub async fn find_chat(&self, id: &ChatId) -> ChatResult<Chat> {
        Self::require_chat_id(id)?;

        let chat = self
            .chats
            .find_chat(id)
            .await
            .map_err(|e| ChatError::store("find_chat", e))?
            .ok_or_else(|| ChatError::ChatNotFound(id.clone()))?;

        if let Some(field) = chat.first_missing_field(true) {
            return Err(ChatError::MissingField(field));
        }
        Ok(chat)
    }

    /// Applies name and owner of `chat` to the stored record.
    pub async fn update_chat_name(&self, chat: &Chat) -> ChatResult<Chat> {
        if let Some(field) = chat.first_missing_field(true) {
            return Err(ChatError::MissingField(field));
        }

        let mut stored = self.find_chat(&chat.id).await?;
        stored.name = chat.name.clone();
        stored.owner = chat.owner.clone();

        self.chats
            .update_chat(&stored)
            .await
            .map_err(|e| ChatError::store("update_chat_name", e))?;

        info!(chat_id = %stored.id, name = %stored.name, "renamed chat");
        Ok(stored)
    }

    /// Deletes the chat, then pulls it from each former member's chat index.
    ///
    /// Index cleanup is best effort: failures are logged and returned in the
    /// outcome but do not fail the deletion.
    pub async fn delete_chat(&self, id: &ChatId) -> ChatResult<DeleteOutcome> {
        let chat = self.find_chat(id).await?;

        self.chats
            .delete_chat(id)
            .await
            .map_err(|e| ChatError::store("delete_chat", e))?;

        let mut cleanup_failures = Vec::new();
        for member in &chat.members {
            if let Err(err) = self.users.remove_chat_from_index(member, id).await {
                warn!(chat_id = %id, user_id = %member, error = %err, "failed to unindex deleted chat");
                cleanup_failures.push((member.clone(), err));
            }
        }

        info!(chat_id = %id, members = chat.members.len(), failures = cleanup_failures.len(), "deleted chat");
        Ok(DeleteOutcome {
            chat,
            cleanup_failures,
        })
    }

    /// Adds users to the chat, then indexes the chat on each user.
    pub async fn add_user(&self, chat_id: &ChatId, user_ids: &[UserId]) -> ChatResult<()> {
        Self::require_membership_args(chat_id, user_ids)?;

        self.chats
            .add_members(chat_id, user_ids)
            .await
            .map_err(|e| ChatError::store("add_user", e))?;

        for user_id in user_ids {
            self.users
                .add_chat_to_index(user_id, chat_id)
                .await
                .map_err(|e| ChatError::store("add_user", e))?;
        }

        info!(chat_id = %chat_id, added = user_ids.len(), "added users to chat");
        Ok(())
    }

    /// Removes users from the chat, then unindexes the chat on each user.
    pub async fn remove_user(&self, chat_id: &ChatId, user_ids: &[UserId]) -> ChatResult<()> {
        Self::require_membership_args(chat_id, user_ids)?;

        self.chats
            .remove_members(chat_id, user_ids)
            .await
            .map_err(|e| ChatError::store("remove_user", e))?;

        for user_id in user_ids {
            self.users
                .remove_chat_from_index(user_id, chat_id)
                .await
                .map_err(|e| ChatError::store("remove_user", e))?;
        }

        info!(chat_id = %chat_id, removed = user_ids.len(), "removed users from chat");
        Ok(())
    }

    pub async fn get_members(&self, chat_id: &ChatId) -> ChatResult<BTreeSet<UserId>> {
        Self::require_chat_id(chat_id)?;
        self.chats
            .list_members(chat_id)
            .await
            .map_err(|e| ChatError::store("get_members", e))
    }

    /// Promotes a user to admin. Membership is not required.
    pub async fn set_admin(&self, user_id: &UserId, chat_id: &ChatId) -> ChatResult<()> {
        Self::require_chat_id(chat_id)?;
        if user_id.is_blank() {
            return Err(ChatError::MissingField("user_id"));
        }

        self.chats
            .add_admin(chat_id, user_id)
            .await
            .map_err(|e| ChatError::store("set_admin", e))?;

        info!(chat_id = %chat_id, user_id = %user_id, "set chat admin");
        Ok(())
    }

    pub async fn get_messages(&self, chat_id: &ChatId) -> ChatResult<Vec<Message>> {
        Self::require_chat_id(chat_id)?;
        self.chats
            .list_messages(chat_id)
            .await
            .map_err(|e| ChatError::store("get_messages", e))
    }

    pub async fn resolve_role(&self, session: &Session, chat_id: &ChatId) -> ChatResult<Role> {
        let chat = self.find_chat(chat_id).await?;
        authorization::resolve_role(session, chat_id, &chat)
    }

    /// Fetches the chat and checks the caller may exercise `capability` on it.
    pub async fn authorize(
        &self,
        session: &Session,
        chat_id: &ChatId,
        capability: Capability,
    ) -> ChatResult<(Chat, Role)> {
        let chat = self.find_chat(chat_id).await?;
        let role = authorization::resolve_role(session, chat_id, &chat)?;
        authorization::require(role, capability)?;
        Ok((chat, role))
    }

    fn require_chat_id(id: &ChatId) -> ChatResult<()> {
        if id.is_blank() {
            return Err(ChatError::MissingField("chat_id"));
        }
        Ok(())
    }

    fn require_membership_args(chat_id: &ChatId, user_ids: &[UserId]) -> ChatResult<()> {
        Self::require_chat_id(chat_id)?;
        if user_ids.is_empty() || user_ids.iter().any(UserId::is_blank) {
            return Err(ChatError::MissingField("user_ids"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use parley_database::{ChatType, ErrorKind, Gender, MemoryStore, StoreOp, User};

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            username: id.to_string(),
            first_name: "First".into(),
            last_name: "Last".into(),
            password: "pw".into(),
            gender: Gender::Male,
            email: format!("{id}@example.com"),
            date_of_birth: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
            contacts: BTreeSet::new(),
            chat_ids: BTreeSet::new(),
            created_at: Utc::now(),
            deleted_at: None,
        }
    }

    async fn setup(users: &[&str]) -> (ChatService<MemoryStore, MemoryStore>, MemoryStore) {
        let store = MemoryStore::new();
        for id in users {
            store.create_user(&user(id)).await.unwrap();
        }
        (ChatService::new(store.clone(), store.clone()), store)
    }

    fn ids(raw: &[&str]) -> Vec<UserId> {
        raw.iter().map(|id| UserId::new(*id)).collect()
    }

    #[tokio::test]
    async fn create_chat_indexes_initial_members() {
        let (service, store) = setup(&["alice", "bob"]).await;
        let chat = Chat::new("team", UserId::new("alice"), ChatType::Group)
            .with_members(ids(&["bob"]));

        let id = service.create_chat(chat).await.unwrap();

        for member in ["alice", "bob"] {
            assert!(store.chat_index(&UserId::new(member)).await.unwrap().contains(&id));
        }
    }

    #[tokio::test]
    async fn create_chat_validates_before_the_store() {
        let (service, store) = setup(&["alice"]).await;
        store.inject_failure(StoreOp::CreateChat, None).await;

        let chat = Chat::new("  ", UserId::new("alice"), ChatType::Group);
        assert!(matches!(
            service.create_chat(chat).await,
            Err(ChatError::MissingField("name"))
        ));
    }

    #[tokio::test]
    async fn create_chat_rejects_unknown_members_before_writing() {
        let (service, store) = setup(&["alice"]).await;
        let chat = Chat::new("team", UserId::new("alice"), ChatType::Group)
            .with_members(ids(&["ghost"]));

        assert!(matches!(
            service.create_chat(chat).await,
            Err(ChatError::UserNotFound(ref id)) if id.as_str() == "ghost"
        ));
        assert!(store.list_chat_ids().await.unwrap().is_empty());
        assert!(store.chat_index(&UserId::new("alice")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn owner_is_indexed_before_failing_members() {
        // "aaron" sorts before "zoe", so owner-first ordering is observable
        let (service, store) = setup(&["zoe", "aaron"]).await;
        store
            .inject_failure(StoreOp::AddChatToIndex, Some("aaron"))
            .await;
        let chat = Chat::new("team", UserId::new("zoe"), ChatType::Group)
            .with_members(ids(&["aaron"]));

        let err = service.create_chat(chat).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        let stored = store.list_chat_ids().await.unwrap();
        assert_eq!(stored.len(), 1);
        assert!(store.chat_index(&UserId::new("zoe")).await.unwrap().contains(&stored[0]));
    }

    #[tokio::test]
    async fn duplicate_chat_is_reported() {
        let (service, _) = setup(&["alice"]).await;
        let chat = Chat::new("team", UserId::new("alice"), ChatType::Group);
        service.create_chat(chat.clone()).await.unwrap();

        let err = service.create_chat(chat).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateChat);
    }

    #[tokio::test]
    async fn add_user_keeps_both_sides_in_sync_and_is_idempotent() {
        let (service, store) = setup(&["alice", "bob", "carol"]).await;
        let id = service
            .create_chat(Chat::new("team", UserId::new("alice"), ChatType::Group))
            .await
            .unwrap();

        let added = ids(&["bob", "carol"]);
        service.add_user(&id, &added).await.unwrap();
        service.add_user(&id, &added).await.unwrap();

        let members = service.get_members(&id).await.unwrap();
        assert_eq!(members.len(), 3);
        for member in &members {
            let index = store.chat_index(member).await.unwrap();
            assert_eq!(index.iter().filter(|c| *c == &id).count(), 1);
        }
    }

    #[tokio::test]
    async fn user_side_failure_leaves_the_chat_side_applied() {
        let (service, store) = setup(&["alice", "bob"]).await;
        let id = service
            .create_chat(Chat::new("team", UserId::new("alice"), ChatType::Group))
            .await
            .unwrap();
        store.inject_failure(StoreOp::AddChatToIndex, Some("bob")).await;

        let err = service.add_user(&id, &ids(&["bob"])).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::OperationFailed);
        assert!(service.get_members(&id).await.unwrap().contains(&UserId::new("bob")));
        assert!(!store.chat_index(&UserId::new("bob")).await.unwrap().contains(&id));
    }

    #[tokio::test]
    async fn remove_user_pulls_both_sides() {
        let (service, store) = setup(&["alice", "bob"]).await;
        let id = service
            .create_chat(
                Chat::new("team", UserId::new("alice"), ChatType::Group)
                    .with_members(ids(&["bob"])),
            )
            .await
            .unwrap();

        service.remove_user(&id, &ids(&["bob"])).await.unwrap();
        service.remove_user(&id, &ids(&["bob"])).await.unwrap();

        assert!(!service.get_members(&id).await.unwrap().contains(&UserId::new("bob")));
        assert!(store.chat_index(&UserId::new("bob")).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn membership_changes_require_arguments() {
        let (service, _) = setup(&[]).await;
        assert!(matches!(
            service.add_user(&ChatId::new("c1"), &[]).await,
            Err(ChatError::MissingField("user_ids"))
        ));
        assert!(matches!(
            service.remove_user(&ChatId::default(), &ids(&["bob"])).await,
            Err(ChatError::MissingField("chat_id"))
        ));
    }

    #[tokio::test]
    async fn update_chat_name_applies_name_and_owner() {
        let (service, _) = setup(&["alice"]).await;
        let id = service
            .create_chat(Chat::new("team", UserId::new("alice"), ChatType::Group))
            .await
            .unwrap();

        let mut chat = service.find_chat(&id).await.unwrap();
        chat.name = "squad".into();
        let updated = service.update_chat_name(&chat).await.unwrap();
        assert_eq!(updated.name, "squad");
        assert_eq!(service.find_chat(&id).await.unwrap().name, "squad");

        service.delete_chat(&id).await.unwrap();
        assert!(matches!(
            service.update_chat_name(&chat).await,
            Err(ChatError::ChatNotFound(_))
        ));
    }

    #[tokio::test]
    async fn delete_reports_cleanup_failures_without_failing() {
        let (service, store) = setup(&["alice", "bob"]).await;
        let id = service
            .create_chat(
                Chat::new("team", UserId::new("alice"), ChatType::Group)
                    .with_members(ids(&["bob"])),
            )
            .await
            .unwrap();
        store
            .inject_failure(StoreOp::RemoveChatFromIndex, Some("bob"))
            .await;

        let outcome = service.delete_chat(&id).await.unwrap();

        assert_eq!(outcome.cleanup_failures.len(), 1);
        assert_eq!(outcome.cleanup_failures[0].0, UserId::new("bob"));
        assert!(store.chat_index(&UserId::new("alice")).await.unwrap().is_empty());
        assert!(matches!(service.find_chat(&id).await, Err(ChatError::ChatNotFound(_))));
    }

    #[tokio::test]
    async fn set_admin_accepts_non_members_but_not_unknown_users() {
        let (service, _) = setup(&["alice", "dave"]).await;
        let id = service
            .create_chat(Chat::new("team", UserId::new("alice"), ChatType::Group))
            .await
            .unwrap();

        service.set_admin(&UserId::new("dave"), &id).await.unwrap();
        let chat = service.find_chat(&id).await.unwrap();
        assert!(chat.is_admin(&UserId::new("dave")));
        assert!(!chat.is_member(&UserId::new("dave")));

        assert!(matches!(
            service.set_admin(&UserId::new("ghost"), &id).await,
            Err(ChatError::UserNotFound(_))
        ));
        assert!(matches!(
            service.set_admin(&UserId::new("dave"), &ChatId::new("nope")).await,
            Err(ChatError::ChatNotFound(_))
        ));
    }

    #[tokio::test]
    async fn authorize_combines_resolution_and_capabilities() {
        let (service, _) = setup(&["alice", "bob"]).await;
        let id = service
            .create_chat(
                Chat::new("team", UserId::new("alice"), ChatType::Group)
                    .with_members(ids(&["bob"])),
            )
            .await
            .unwrap();

        let mut bob = Session::new(UserId::new("bob"));
        bob.insert_chat("team", id.clone(), Role::Normal);

        assert_eq!(service.resolve_role(&bob, &id).await.unwrap(), Role::Normal);
        assert!(service.authorize(&bob, &id, Capability::ReadChat).await.is_ok());
        assert!(matches!(
            service.authorize(&bob, &id, Capability::ManageMembers).await,
            Err(ChatError::Unauthorized { role: Role::Normal, .. })
        ));
    }
}
