//! HTTP client for a parley server.

use parley_core::{ConsumerOutcome, ConsumerUpdate, StreamConsumer};
use reqwest::{Client, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid server URL '{0}'")]
    BadServerUrl(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a JSON `{"error": ...}` body.
    #[error("{message} ({status})")]
    Api { status: StatusCode, message: String },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    pub id: String,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationDetail {
    pub id: String,
    pub title: String,
    pub messages: Vec<MessageView>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    session_id: String,
}

impl ApiClient {
    pub fn new(server: &str, session_id: String) -> Result<Self, ClientError> {
        let base = Url::parse(server).map_err(|_| ClientError::BadServerUrl(server.to_owned()))?;
        if base.cannot_be_a_base() {
            return Err(ClientError::BadServerUrl(server.to_owned()));
        }
        Ok(Self { http: Client::new(), base, session_id })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Send one chat turn and follow its stream to the end.
    ///
    /// `on_update` sees every change to the in-progress reply as it arrives.
    pub async fn send(
        &self,
        message: &str,
        conversation_id: Option<&str>,
        failure_notice: &str,
        on_update: impl FnMut(&ConsumerUpdate),
    ) -> Result<ConsumerOutcome, ClientError> {
        let body = json!({
            "message": message,
            "conversationId": conversation_id,
            "sessionId": self.session_id,
        });
        let response = self.http.post(self.url(&["api", "chat"])?).json(&body).send().await?;
        let response = check(response).await?;

        let consumer = StreamConsumer::new(conversation_id.map(str::to_owned), failure_notice);
        let outcome = consumer.consume(response.bytes_stream(), on_update).await?;
        debug!(failed = outcome.failed, conversation_id = ?outcome.conversation_id, "turn finished");
        Ok(outcome)
    }

    pub async fn list(&self) -> Result<Vec<ConversationSummary>, ClientError> {
        let mut url = self.url(&["api", "conversations"])?;
        url.query_pairs_mut().append_pair("sessionId", &self.session_id);
        let response = check(self.http.get(url).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn show(&self, id: &str) -> Result<ConversationDetail, ClientError> {
        let response = check(self.http.get(self.url(&["api", "conversations", id])?).send().await?).await?;
        Ok(response.json().await?)
    }

    pub async fn rename(&self, id: &str, title: &str) -> Result<ConversationSummary, ClientError> {
        let response = self
            .http
            .patch(self.url(&["api", "conversations", id])?)
            .json(&json!({ "title": title }))
            .send()
            .await?;
        Ok(check(response).await?.json().await?)
    }

    pub async fn delete(&self, id: &str) -> Result<(), ClientError> {
        check(self.http.delete(self.url(&["api", "conversations", id])?).send().await?).await?;
        Ok(())
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ClientError::BadServerUrl(self.base.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Turn a non-success response into [`ClientError::Api`].
async fn check(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or_else(|_| if text.is_empty() { status.to_string() } else { text });
    Err(ClientError::Api { status, message })
}

#[cfg(test)]
mod test {
    use std::convert::Infallible;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::body::Body;
    use axum::extract::{Path, Query};
    use axum::http::{StatusCode as AxumStatus, header};
    use axum::response::{IntoResponse, Response as AxumResponse};
    use axum::routing::{get, post};
    use bytes::Bytes;
    use futures::stream;
    use parley_core::{StreamEvent, encode_frame};
    use serde_json::Value;

    use super::*;

    const NOTICE: &str = "Something went wrong. Please try again.";

    /// Serve a stand-in for the real server on an ephemeral port.
    async fn mock_server(chat_frames: Vec<StreamEvent>) -> (String, Arc<Mutex<Vec<Value>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_chat = Arc::clone(&seen);

        let app = axum::Router::new()
            .route(
                "/api/chat",
                post(move |Json(body): Json<Value>| {
                    let frames = chat_frames.clone();
                    seen_chat.lock().unwrap().push(body);
                    async move {
                        // Cut the wire into 7-byte pieces so frames straddle chunks.
                        let wire: Vec<u8> = frames.iter().flat_map(|e| encode_frame(e).to_vec()).collect();
                        let chunks: Vec<Result<Bytes, Infallible>> =
                            wire.chunks(7).map(|c| Ok(Bytes::copy_from_slice(c))).collect();
                        ([(header::CONTENT_TYPE, "text/event-stream")], Body::from_stream(stream::iter(chunks)))
                    }
                }),
            )
            .route(
                "/api/conversations",
                get(|Query(q): Query<std::collections::HashMap<String, String>>| async move {
                    match q.get("sessionId") {
                        Some(s) if s == "s1" => Json(serde_json::json!([{
                            "id": "c1", "title": "Hello",
                            "createdAt": "2025-03-01T10:00:00.000Z",
                            "updatedAt": "2025-03-01T10:00:00.000Z"
                        }]))
                        .into_response(),
                        _ => (AxumStatus::BAD_REQUEST, Json(serde_json::json!({ "error": "sessionId is required" })))
                            .into_response(),
                    }
                }),
            )
            .route(
                "/api/conversations/{id}",
                get(|Path(id): Path<String>| async move {
                    let response: AxumResponse = (
                        AxumStatus::NOT_FOUND,
                        Json(serde_json::json!({ "error": format!("no {id}") })),
                    )
                        .into_response();
                    response
                }),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}"), seen)
    }

    #[tokio::test]
    async fn send_streams_updates_and_learns_conversation_id() {
        let (server, seen) = mock_server(vec![
            StreamEvent::text("Hel"),
            StreamEvent::text("lo!"),
            StreamEvent::done("c-new"),
        ])
        .await;
        let client = ApiClient::new(&server, "s1".into()).unwrap();

        let mut updates = Vec::new();
        let outcome = client.send("Hi", None, NOTICE, |u| updates.push(u.clone())).await.unwrap();

        assert_eq!(
            updates,
            vec![
                ConsumerUpdate::Content("Hel".into()),
                ConsumerUpdate::Content("Hello!".into()),
                ConsumerUpdate::ConversationAssigned("c-new".into()),
            ]
        );
        assert_eq!(outcome.content, "Hello!");
        assert_eq!(outcome.conversation_id.as_deref(), Some("c-new"));
        assert!(!outcome.failed);

        let body = seen.lock().unwrap()[0].clone();
        assert_eq!(body, serde_json::json!({ "message": "Hi", "conversationId": null, "sessionId": "s1" }));
    }

    #[tokio::test]
    async fn error_frame_shows_notice() {
        let (server, _) = mock_server(vec![StreamEvent::text("Par"), StreamEvent::error("boom")]).await;
        let client = ApiClient::new(&server, "s1".into()).unwrap();
        let outcome = client.send("Hi", Some("c1"), NOTICE, |_| {}).await.unwrap();
        assert!(outcome.failed);
        assert_eq!(outcome.content, NOTICE);
        assert_eq!(outcome.conversation_id.as_deref(), Some("c1"));
    }

    #[tokio::test]
    async fn list_and_api_errors() {
        let (server, _) = mock_server(Vec::new()).await;

        let client = ApiClient::new(&server, "s1".into()).unwrap();
        let list = client.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].title, "Hello");

        let err = client.show("missing").await.unwrap_err();
        assert!(matches!(err, ClientError::Api { status, message } if status == StatusCode::NOT_FOUND && message == "no missing"));

        let other = ApiClient::new(&server, "s2".into()).unwrap();
        let err = other.list().await.unwrap_err();
        assert!(matches!(err, ClientError::Api { message, .. } if message == "sessionId is required"));
    }

    #[test]
    fn urls_are_built_from_segments() {
        let client = ApiClient::new("http://localhost:3000/", "s".into()).unwrap();
        assert_eq!(client.url(&["api", "chat"]).unwrap().as_str(), "http://localhost:3000/api/chat");
        let client = ApiClient::new("http://localhost:3000/prefix", "s".into()).unwrap();
        assert_eq!(
            client.url(&["api", "conversations", "a b"]).unwrap().as_str(),
            "http://localhost:3000/prefix/api/conversations/a%20b"
        );
        assert!(ApiClient::new("not a url", "s".into()).is_err());
    }
}
