//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{"error": "..."}` JSON response with an appropriate status code.
//!
//! **Security note:** internal errors are logged with full detail but only
//! the localized generic message is returned, so SQL, backend bodies or
//! other implementation details never leak to clients.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use parley_core::{Locale, RelayError};
use serde_json::json;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Anything the caller cannot fix.  `message` is what the client sees.
    #[error("internal error: {detail}")]
    Internal { detail: String, message: &'static str },
}

impl ServerError {
    /// Map a relay or history failure, localizing the generic 500 message.
    pub fn relay(err: RelayError, locale: Locale) -> Self {
        match err {
            RelayError::Validation(m) => ServerError::BadRequest(m),
            RelayError::NotFound(m) => ServerError::NotFound(m),
            other => ServerError::Internal { detail: other.to_string(), message: locale.server_error() },
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, client_message) = match self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            ServerError::NotFound(m) => (StatusCode::NOT_FOUND, m),

            ServerError::Internal { detail, message } => {
                error!(error = %detail, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, message.to_owned())
            }
        };
        (status, Json(json!({ "error": client_message }))).into_response()
    }
}

#[cfg(test)]
mod test {
    use http_body_util::BodyExt;
    use tracing_test::traced_test;

    use super::*;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn client_errors_keep_their_message() {
        let err = ServerError::relay(RelayError::Validation("title is required".into()), Locale::En);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "title is required" }));

        let response = ServerError::relay(RelayError::NotFound("gone".into()), Locale::En).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    #[traced_test]
    async fn internal_detail_is_logged_not_returned() {
        let err = ServerError::relay(RelayError::Unexpected("disk on fire".into()), Locale::Ja);
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_json(response).await, json!({ "error": "サーバーエラーが発生しました" }));
        assert!(logs_contain("disk on fire"));
    }
}
