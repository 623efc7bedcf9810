//! Server configuration, loaded from environment variables at startup.

use std::time::Duration;

use parley_core::Locale;
use parley_core::backend::VertexSettings;

/// Runtime configuration for parley-server.
///
/// Every field has a sensible default so the server works out-of-the-box
/// without any environment variables set.  Generation backend settings are
/// carried through unvalidated; a missing project id only fails the first
/// chat turn.
#[derive(Debug, Clone)]
pub struct Config {
    /// TCP address to bind (default: `"0.0.0.0:3000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://parley.db"`).
    pub database_url: String,

    /// Upper bound on pooled database connections.
    pub db_max_connections: u32,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Comma-separated list of allowed CORS origins.  `None` allows any.
    pub cors_allowed_origins: Option<String>,

    /// Mount Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// Language of every user-facing message.
    pub locale: Locale,

    /// Bound on opening the backend stream and on each fragment wait.
    pub backend_timeout: Duration,

    pub vertex: VertexSettings,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut cfg = Self::from_lookup(|key| std::env::var(key).ok());
        cfg.vertex = VertexSettings::from_env();
        cfg
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let env_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_owned());
        let flag = |key: &str, default: bool| lookup(key).map(|v| parse_bool(&v)).unwrap_or(default);

        Self {
            bind_address: env_or("PARLEY_BIND", "0.0.0.0:3000"),
            database_url: lookup("PARLEY_DATABASE_URL")
                .or_else(|| lookup("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://parley.db".to_owned()),
            db_max_connections: parse_env(&lookup, "PARLEY_DB_MAX_CONNECTIONS", 5),
            log_level: env_or("PARLEY_LOG", "info"),
            log_json: flag("PARLEY_LOG_JSON", false),
            cors_allowed_origins: lookup("PARLEY_CORS_ORIGINS").filter(|v| !v.trim().is_empty()),
            enable_swagger: flag("PARLEY_ENABLE_SWAGGER", true),
            locale: parse_env(&lookup, "PARLEY_LOCALE", Locale::En),
            backend_timeout: Duration::from_secs(parse_env(&lookup, "PARLEY_BACKEND_TIMEOUT_SECS", 60)),
            vertex: VertexSettings::default(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

// ── private helpers ──────────────────────────────────────────────────────────

fn parse_bool(v: &str) -> bool {
    v == "1" || v.eq_ignore_ascii_case("true")
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T {
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}
