//! Message workflows authorized against the caller's session.

use parley_chats::{ChatError, ChatService, MessageService};
use parley_database::{
    Capability, ChatId, ChatStore, Message, MessageId, MessageStore, SessionId, SessionStore,
    UserStore,
};
use parley_users::SessionService;

use crate::error::WorkflowResult;

pub struct Messaging<C, U, M, S> {
    chats: ChatService<C, U>,
    messages: MessageService<M>,
    sessions: SessionService<S>,
}

impl<C, U, M, S> Messaging<C, U, M, S>
where
    C: ChatStore,
    U: UserStore,
    M: MessageStore,
    S: SessionStore,
{
    pub fn new(
        chats: ChatService<C, U>,
        messages: MessageService<M>,
        sessions: SessionService<S>,
    ) -> Self {
        Self {
            chats,
            messages,
            sessions,
        }
    }

    /// Posts `content` as the session's user.
    pub async fn send_message(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
        content: &str,
    ) -> WorkflowResult<MessageId> {
        if content.trim().is_empty() {
            return Err(ChatError::MissingField("content").into());
        }

        let session = self.sessions.get_session(session_id).await?;
        self.chats
            .authorize(&session, chat_id, Capability::PostMessage)
            .await?;

        let message = Message::new(session.user_id.clone(), chat_id.clone(), content);
        Ok(self.messages.send_message(message).await?)
    }

    /// Deletes any message of the chat; the sender is not checked.
    pub async fn delete_message(
        &self,
        session_id: &SessionId,
        chat_id: &ChatId,
        message_id: &MessageId,
    ) -> WorkflowResult<()> {
        let session = self.sessions.get_session(session_id).await?;
        self.chats
            .authorize(&session, chat_id, Capability::DeleteMessage)
            .await?;

        Ok(self.messages.delete_message(chat_id, message_id).await?)
    }

    pub async fn get_message(&self, message_id: &MessageId) -> WorkflowResult<Message> {
        Ok(self.messages.get_message(message_id).await?)
    }
}
