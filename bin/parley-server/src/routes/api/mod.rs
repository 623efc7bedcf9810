pub mod chat;
pub mod conversations;

use std::sync::Arc;

use axum::Router;
use utoipa::OpenApi;

use crate::state::AppState;

/// Routes nested under `/api`.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(chat::router()).merge(conversations::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct Api;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut doc = Api::openapi();
    doc.merge(chat::ChatApi::openapi());
    doc.merge(conversations::ConversationsApi::openapi());
    doc
}
