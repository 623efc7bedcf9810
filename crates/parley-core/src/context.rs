//! Rebuilds the backend's input from stored history.
//!
//! The stored messages are the backend's only context: no system prompt, no
//! summarization, no truncation.

use crate::backend::{Turn, TurnRole};
use crate::entities::{Message, MessageStore, Role};

/// Every message of `conversation_id`, oldest first, as backend turns.
pub async fn build_context<S>(store: &S, conversation_id: &str) -> Result<Vec<Turn>, sqlx::Error>
where
    S: MessageStore,
{
    let messages = store.list_messages(conversation_id).await?;
    Ok(messages.into_iter().map(to_turn).collect())
}

pub fn map_role(role: Role) -> TurnRole {
    match role {
        Role::User => TurnRole::User,
        Role::Assistant => TurnRole::Model,
    }
}

fn to_turn(message: Message) -> Turn {
    Turn { role: map_role(message.role), text: message.content }
}
