//! Conversation CRUD used by the HTTP surface.
//!
//! Thin sequencing over [`ConversationStore`] and [`MessageStore`].  The one
//! rule that lives here rather than in the store is the cascade: the store has
//! no foreign keys, so deleting a conversation means deleting its messages
//! first and the conversation row second.

use tracing::{info, warn};

use crate::entities::{Conversation, ConversationStore, Message, MessageStore};
use crate::error::RelayError;
use crate::locale::Locale;

/// A conversation together with its full, ordered message list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationWithMessages {
    pub conversation: Conversation,
    pub messages: Vec<Message>,
}

/// All conversations of one client session, most recently updated first.
pub async fn list_for_session<S>(
    store: &S,
    session_id: Option<&str>,
    locale: Locale,
) -> Result<Vec<Conversation>, RelayError>
where
    S: ConversationStore,
{
    let session_id = session_id
        .filter(|s| !s.is_empty())
        .ok_or_else(|| RelayError::Validation(locale.session_required().to_owned()))?;
    Ok(store.list_conversations(session_id).await?)
}

pub async fn load_with_messages<S>(
    store: &S,
    id: &str,
    locale: Locale,
) -> Result<ConversationWithMessages, RelayError>
where
    S: ConversationStore + MessageStore,
{
    let conversation = store
        .get_conversation(id)
        .await?
        .ok_or_else(|| RelayError::NotFound(locale.conversation_not_found().to_owned()))?;
    let messages = store.list_messages(id).await?;
    Ok(ConversationWithMessages { conversation, messages })
}

/// Set a new title, stored exactly as sent.  Only a missing or empty title
/// is rejected, before the store is touched.
pub async fn rename<S>(
    store: &S,
    id: &str,
    title: Option<&str>,
    locale: Locale,
) -> Result<Conversation, RelayError>
where
    S: ConversationStore,
{
    let title = title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| RelayError::Validation(locale.title_required().to_owned()))?;
    store
        .rename_conversation(id, title)
        .await?
        .ok_or_else(|| RelayError::NotFound(locale.conversation_not_found().to_owned()))
}

/// Delete a conversation and every message it owns.
///
/// Two independent deletes: a crash between them leaves orphaned messages
/// whose conversation no longer exists.  Nothing reads such messages, and a
/// repeated delete of the same id reports `NotFound`.
pub async fn delete_cascade<S>(store: &S, id: &str, locale: Locale) -> Result<u64, RelayError>
where
    S: ConversationStore + MessageStore,
{
    if store.get_conversation(id).await?.is_none() {
        return Err(RelayError::NotFound(locale.conversation_not_found().to_owned()));
    }
    let removed = store.delete_messages(id).await?;
    if !store.delete_conversation(id).await? {
        // Deleted concurrently between the lookup and here.
        warn!(conversation_id = %id, "conversation vanished during cascade delete");
    }
    info!(conversation_id = %id, messages = removed, "conversation deleted");
    Ok(removed)
}
