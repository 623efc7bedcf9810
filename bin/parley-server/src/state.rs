//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use parley_core::{Locale, Relay, SqliteStore};

use crate::config::Config;

/// State shared across all HTTP handlers.
///
/// Built once in `main`; the store and the generation backend inside the
/// relay live for the whole process.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    /// Conversation and message store.
    pub store: Arc<SqliteStore>,
    /// Drives chat turns against the generation backend.
    pub relay: Relay<SqliteStore>,
}

impl AppState {
    pub fn locale(&self) -> Locale {
        self.config.locale
    }
}
