//! Conversation history routes.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use parley_core::history;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::extract::LenientJson;
use crate::schemas::api::conversation::{
    ConversationDetailResponse, ConversationResponse, DeleteConversationResponse,
    ListConversationsQuery, MessageResponse, RenameConversationRequest,
};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(list_conversations, get_conversation, rename_conversation, delete_conversation),
    components(schemas(
        ConversationResponse,
        ConversationDetailResponse,
        MessageResponse,
        RenameConversationRequest,
        DeleteConversationResponse
    ))
)]
pub struct ConversationsApi;

/// Register conversation routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/{id}",
            get(get_conversation).patch(rename_conversation).delete(delete_conversation),
        )
}

// ── Conversation handlers ─────────────────────────────────────────────────────

#[utoipa::path(
    get,
    path = "/api/conversations",
    tag = "conversations",
    params(ListConversationsQuery),
    responses(
        (status = 200, description = "Conversations, most recently updated first", body = Vec<ConversationResponse>),
        (status = 400, description = "sessionId missing"),
        (status = 500, description = "Store error"),
    )
)]
pub async fn list_conversations(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListConversationsQuery>,
) -> Result<Json<Vec<ConversationResponse>>, ServerError> {
    let locale = state.locale();
    let conversations = history::list_for_session(state.store.as_ref(), query.session_id.as_deref(), locale)
        .await
        .map_err(|e| ServerError::relay(e, locale))?;
    Ok(Json(conversations.iter().map(ConversationResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation with its messages, oldest first", body = ConversationDetailResponse),
        (status = 404, description = "Conversation not found"),
        (status = 500, description = "Store error"),
    )
)]
pub async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ConversationDetailResponse>, ServerError> {
    let locale = state.locale();
    let full = history::load_with_messages(state.store.as_ref(), &id, locale)
        .await
        .map_err(|e| ServerError::relay(e, locale))?;
    Ok(Json(full.into()))
}

#[utoipa::path(
    patch,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    request_body = RenameConversationRequest,
    responses(
        (status = 200, description = "Renamed conversation", body = ConversationResponse),
        (status = 400, description = "title missing"),
        (status = 404, description = "Conversation not found"),
        (status = 500, description = "Store error"),
    )
)]
pub async fn rename_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    LenientJson(req): LenientJson<RenameConversationRequest>,
) -> Result<Json<ConversationResponse>, ServerError> {
    let locale = state.locale();
    let renamed = history::rename(state.store.as_ref(), &id, req.title.as_deref(), locale)
        .await
        .map_err(|e| ServerError::relay(e, locale))?;
    Ok(Json((&renamed).into()))
}

#[utoipa::path(
    delete,
    path = "/api/conversations/{id}",
    tag = "conversations",
    params(("id" = String, Path, description = "Conversation id")),
    responses(
        (status = 200, description = "Conversation and its messages deleted", body = DeleteConversationResponse),
        (status = 404, description = "Conversation not found"),
        (status = 500, description = "Store error"),
    )
)]
pub async fn delete_conversation(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteConversationResponse>, ServerError> {
    let locale = state.locale();
    history::delete_cascade(state.store.as_ref(), &id, locale)
        .await
        .map_err(|e| ServerError::relay(e, locale))?;
    Ok(Json(DeleteConversationResponse { success: true }))
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode, header};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use parley_core::backend::testing::ScriptedBackend;
    use parley_core::entities::{ConversationStore, MessageStore};
    use parley_core::{Conversation, Role};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::test_support::{test_app, test_state};

    fn request(method: Method, uri: &str, body: Body) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .unwrap()
    }

    async fn body_json(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn seeded() -> (Arc<AppState>, Conversation) {
        let state = test_state(ScriptedBackend::replying(&[])).await;
        let conv = state.store.create_conversation("s1", "Hello").await.unwrap();
        state.store.append_message(&conv.id, Role::User, "Hello").await.unwrap();
        state.store.append_message(&conv.id, Role::Assistant, "Hi there!").await.unwrap();
        (state, conv)
    }

    #[tokio::test]
    async fn list_requires_session_id() {
        let (state, _) = seeded().await;
        let response = test_app(state)
            .oneshot(request(Method::GET, "/api/conversations", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "sessionId is required" }));
    }

    #[tokio::test]
    async fn list_is_scoped_to_session_and_newest_first() {
        let (state, older) = seeded().await;
        let newer = state.store.create_conversation("s1", "Second").await.unwrap();
        state.store.create_conversation("s2", "Elsewhere").await.unwrap();

        let response = test_app(state)
            .oneshot(request(Method::GET, "/api/conversations?sessionId=s1", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let ids: Vec<&str> = json.as_array().unwrap().iter().map(|c| c["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec![newer.id.as_str(), older.id.as_str()]);
        let first = &json[0];
        assert_eq!(first["title"], "Second");
        assert!(first["createdAt"].is_string());
        assert!(first["updatedAt"].is_string());
    }

    #[tokio::test]
    async fn detail_includes_ordered_messages_and_is_stable() {
        let (state, conv) = seeded().await;
        let uri = format!("/api/conversations/{}", conv.id);

        let first = test_app(state.clone())
            .oneshot(request(Method::GET, &uri, Body::empty()))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let first = body_json(first).await;
        let second = body_json(
            test_app(state).oneshot(request(Method::GET, &uri, Body::empty())).await.unwrap(),
        )
        .await;
        assert_eq!(first, second);

        assert_eq!(first["id"], conv.id.as_str());
        assert_eq!(first["title"], "Hello");
        let messages = first["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "user");
        assert_eq!(messages[0]["content"], "Hello");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(messages[1]["content"], "Hi there!");
    }

    #[tokio::test]
    async fn detail_of_unknown_id_is_404() {
        let (state, _) = seeded().await;
        let response = test_app(state)
            .oneshot(request(Method::GET, "/api/conversations/nope", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await, json!({ "error": "conversation not found" }));
    }

    #[tokio::test]
    async fn rename_updates_title() {
        let (state, conv) = seeded().await;
        let uri = format!("/api/conversations/{}", conv.id);
        let response = test_app(state.clone())
            .oneshot(request(Method::PATCH, &uri, Body::from(json!({ "title": "Renamed" }).to_string())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["title"], "Renamed");
        assert_eq!(json["id"], conv.id.as_str());

        let stored = state.store.get_conversation(&conv.id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert!(stored.updated_at >= conv.updated_at);
    }

    #[tokio::test]
    async fn rename_with_empty_body_is_400_without_mutation() {
        let (state, conv) = seeded().await;
        let uri = format!("/api/conversations/{}", conv.id);
        let response = test_app(state.clone())
            .oneshot(request(Method::PATCH, &uri, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "title is required" }));
        assert_eq!(state.store.get_conversation(&conv.id).await.unwrap().unwrap(), conv);
    }

    #[tokio::test]
    async fn rename_unknown_is_404() {
        let (state, _) = seeded().await;
        let response = test_app(state)
            .oneshot(request(
                Method::PATCH,
                "/api/conversations/nope",
                Body::from(json!({ "title": "x" }).to_string()),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_cascades_to_messages() {
        let (state, conv) = seeded().await;
        let uri = format!("/api/conversations/{}", conv.id);

        let response = test_app(state.clone())
            .oneshot(request(Method::DELETE, &uri, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await, json!({ "success": true }));

        let response = test_app(state.clone())
            .oneshot(request(Method::GET, &uri, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(state.store.count_messages(&conv.id).await.unwrap(), 0);

        let response = test_app(state)
            .oneshot(request(Method::DELETE, &uri, Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
