use parley_core::ChatTurn;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Body of `POST /api/chat`.  Fields are optional at the type level so a
/// missing one is reported with the localized 400 message.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatRequest {
    /// The user's message.  Required.
    pub message: Option<String>,
    /// Existing conversation to continue; omit or `null` to start a new one.
    pub conversation_id: Option<String>,
    /// Client session key.  Required.
    pub session_id: Option<String>,
}

impl From<ChatRequest> for ChatTurn {
    fn from(req: ChatRequest) -> Self {
        ChatTurn {
            message: req.message,
            conversation_id: req.conversation_id,
            session_id: req.session_id,
        }
    }
}

/// One record of the `text/event-stream` response (documentation only).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ChatStreamFrame {
    Text {
        text: String,
    },
    Done {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    Error {
        error: String,
    },
}
