//! Shared fixtures for route tests.

use std::sync::Arc;

use axum::Router;
use parley_core::backend::testing::ScriptedBackend;
use parley_core::{GenerationBackend, Relay, RelaySettings, SqliteStore};

use crate::config::Config;
use crate::routes;
use crate::state::AppState;

/// Default config, an in-memory store and `backend`.
pub async fn test_state(backend: ScriptedBackend) -> Arc<AppState> {
    let config = Config::default();
    let store = Arc::new(SqliteStore::in_memory().await.expect("in-memory store"));
    let backend: Arc<dyn GenerationBackend> = Arc::new(backend);
    let relay = Relay::new(
        Arc::clone(&store),
        backend,
        RelaySettings { fragment_timeout: config.backend_timeout, locale: config.locale },
    );
    Arc::new(AppState { config: Arc::new(config), store, relay })
}

pub fn test_app(state: Arc<AppState>) -> Router {
    routes::build(state)
}
