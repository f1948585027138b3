//! Role resolution from session-held state.
//!
//! Resolution never reads the session store. The chat record is the only
//! authoritative input; everything else comes from the caller's session.

use parley_database::{Capability, Chat, ChatId, Role, Session, UserId};

use crate::types::{ChatError, ChatResult};

/// Resolves the caller's role in `chat`.
///
/// The session must map the chat's current name to exactly `chat_id`. Admin
/// membership is checked before ownership, so an owner who is also listed as
/// an admin resolves to [`Role::Admin`].
pub fn resolve_role(session: &Session, chat_id: &ChatId, chat: &Chat) -> ChatResult<Role> {
    let entry = session
        .chats
        .get(&chat.name)
        .ok_or_else(|| ChatError::NotAMember {
            name: chat.name.clone(),
        })?;

    if &entry.chat_id != chat_id {
        return Err(ChatError::InvalidChatReference {
            name: chat.name.clone(),
            mapped: entry.chat_id.clone(),
            requested: chat_id.clone(),
        });
    }

    Ok(role_of(chat, &session.user_id))
}

/// Role of `user_id` according to the chat record alone.
pub fn role_of(chat: &Chat, user_id: &UserId) -> Role {
    if chat.is_admin(user_id) {
        Role::Admin
    } else if chat.is_owner(user_id) {
        Role::Owner
    } else {
        Role::Normal
    }
}

pub fn require(role: Role, capability: Capability) -> ChatResult<()> {
    if role.can(capability) {
        Ok(())
    } else {
        Err(ChatError::Unauthorized { role, capability })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parley_database::{ChatType, ErrorKind};

    fn chat() -> Chat {
        let mut chat = Chat::new("team", UserId::new("alice"), ChatType::Group)
            .with_members([UserId::new("bob"), UserId::new("carol")]);
        chat.id = ChatId::new("c1");
        chat.admins.insert(UserId::new("bob"));
        chat
    }

    fn session_for(user: &str) -> Session {
        let mut session = Session::new(UserId::new(user));
        session.insert_chat("team", ChatId::new("c1"), Role::Normal);
        session
    }

    #[test]
    fn resolves_each_role() {
        let chat = chat();
        let id = ChatId::new("c1");
        assert_eq!(resolve_role(&session_for("alice"), &id, &chat).unwrap(), Role::Owner);
        assert_eq!(resolve_role(&session_for("bob"), &id, &chat).unwrap(), Role::Admin);
        assert_eq!(resolve_role(&session_for("carol"), &id, &chat).unwrap(), Role::Normal);
    }

    #[test]
    fn admin_listing_takes_precedence_over_ownership() {
        let mut chat = chat();
        chat.admins.insert(UserId::new("alice"));
        let role = resolve_role(&session_for("alice"), &ChatId::new("c1"), &chat).unwrap();
        assert_eq!(role, Role::Admin);
    }

    #[test]
    fn unmapped_name_is_not_a_member() {
        let session = Session::new(UserId::new("alice"));
        let err = resolve_role(&session, &ChatId::new("c1"), &chat()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotAMember);
    }

    #[test]
    fn name_mapped_to_another_chat_is_an_invalid_reference() {
        let mut session = Session::new(UserId::new("alice"));
        session.insert_chat("team", ChatId::new("c2"), Role::Owner);
        let err = resolve_role(&session, &ChatId::new("c1"), &chat()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidChatReference);
    }

    #[test]
    fn cached_role_is_not_consulted() {
        let mut session = session_for("carol");
        session.set_role(&ChatId::new("c1"), Role::Owner);
        let role = resolve_role(&session, &ChatId::new("c1"), &chat()).unwrap();
        assert_eq!(role, Role::Normal);
    }

    #[test]
    fn require_applies_the_capability_table() {
        assert!(require(Role::Owner, Capability::RenameChat).is_ok());
        assert!(require(Role::Admin, Capability::ManageMembers).is_ok());
        assert!(matches!(
            require(Role::Normal, Capability::DeleteChat),
            Err(ChatError::Unauthorized { role: Role::Normal, capability: Capability::DeleteChat })
        ));
    }
}
