//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document endpoint (disable with `PARLEY_ENABLE_SWAGGER=false`)
//! - Health / heartbeat route
//! - Chat and conversation routes under `/api`

pub mod api;
pub mod doc;
mod health;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

// ── Router builder ────────────────────────────────────────────────────────────

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new().merge(health::router()).nest("/api", api::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

#[cfg(test)]
mod test {
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use parley_core::backend::testing::ScriptedBackend;
    use tower::ServiceExt;

    use crate::middleware::trace::X_TRACE_ID;
    use crate::test_support::{test_app, test_state};

    #[tokio::test]
    async fn responses_carry_a_trace_id() {
        let state = test_state(ScriptedBackend::replying(&[])).await;
        let response = test_app(state)
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(X_TRACE_ID));
    }

    #[tokio::test]
    async fn incoming_trace_id_is_echoed() {
        let state = test_state(ScriptedBackend::replying(&[])).await;
        let id = "0f8fad5b-d9cb-469f-a165-70867728950e";
        let response = test_app(state)
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header(X_TRACE_ID, id)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.headers()[X_TRACE_ID], id);
    }

    #[tokio::test]
    async fn openapi_document_is_served_when_enabled() {
        let state = test_state(ScriptedBackend::replying(&[])).await;
        let response = test_app(state)
            .oneshot(Request::builder().uri("/api-docs/openapi.json").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
