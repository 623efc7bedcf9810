//! Streaming chat turn.
//!
//! The handler hands the request to the relay.  Validation, unknown
//! conversation ids and store failures before the user turn is saved come
//! back as ordinary JSON errors; after that the response is a
//! `text/event-stream` of `data: {json}\n\n` records that always ends with a
//! single `done` or `error` record.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use futures::StreamExt;
use tracing::info;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::LenientJson;
use crate::schemas::api::chat::{ChatRequest, ChatStreamFrame};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(chat), components(schemas(ChatRequest, ChatStreamFrame)))]
pub struct ChatApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/chat", post(chat))
}

/// Send a message and stream the reply (`POST /api/chat`).
///
/// Starts a new conversation when `conversationId` is absent.  The user turn
/// is stored before generation begins and survives a failed generation.
#[utoipa::path(
    post,
    path = "/api/chat",
    tag = "chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Event stream of chat frames", body = ChatStreamFrame, content_type = "text/event-stream"),
        (status = 400, description = "message or sessionId missing"),
        (status = 404, description = "conversationId does not exist"),
        (status = 500, description = "Failure before streaming started"),
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    LenientJson(req): LenientJson<ChatRequest>,
) -> Result<Response, ServerError> {
    let stream = state
        .relay
        .start(req.into())
        .await
        .map_err(|e| ServerError::relay(e, state.locale()))?;
    info!(conversation_id = %stream.conversation_id, "chat stream started");

    // Dropping `finished` detaches the generation task; it completes and
    // persists even if the client disconnects.  Each event is one JSON
    // `data:` line; no keep-alive comments are interleaved.
    let events = stream.events.map(|event| Event::default().json_data(&event));

    Ok(([(header::CONNECTION, "keep-alive")], Sse::new(events)).into_response())
}
