use parley_core::history::ConversationWithMessages;
use parley_core::{Conversation, Message};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::timestamp;

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[serde(rename_all = "camelCase")]
#[into_params(parameter_in = Query)]
pub struct ListConversationsQuery {
    /// Client session key whose conversations are listed.  Required.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RenameConversationRequest {
    pub title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationResponse {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MessageResponse {
    pub id: String,
    /// `user` or `assistant`.
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetailResponse {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    /// Oldest first.
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeleteConversationResponse {
    pub success: bool,
}

impl From<&Conversation> for ConversationResponse {
    fn from(c: &Conversation) -> Self {
        ConversationResponse {
            id: c.id.clone(),
            title: c.title.clone(),
            created_at: timestamp(&c.created_at),
            updated_at: timestamp(&c.updated_at),
        }
    }
}

impl From<&Message> for MessageResponse {
    fn from(m: &Message) -> Self {
        MessageResponse {
            id: m.id.clone(),
            role: m.role.to_string(),
            content: m.content.clone(),
            created_at: timestamp(&m.created_at),
        }
    }
}

impl From<ConversationWithMessages> for ConversationDetailResponse {
    fn from(full: ConversationWithMessages) -> Self {
        let ConversationResponse { id, title, created_at, updated_at } = (&full.conversation).into();
        ConversationDetailResponse {
            id,
            title,
            created_at,
            updated_at,
            messages: full.messages.iter().map(MessageResponse::from).collect(),
        }
    }
}
