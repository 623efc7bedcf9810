//! Persistence layer.
//!
//! [`ConversationStore`] and [`MessageStore`] define what the relay and the
//! HTTP handlers need from the system of record.  The default implementation
//! is [`SqliteStore`].  To swap to another database, implement both traits for
//! your new type and change the concrete type held by the server state.
//!
//! All trait methods use `impl Future` in their signatures so no extra
//! `async-trait` crate is required here.
//!
//! # Initialization contract
//!
//! A store is constructed exactly once per process (see
//! [`SqliteStore::connect`]) and shared behind an `Arc` for the lifetime of the
//! process.  It is never rebuilt implicitly; concurrent use is delegated to the
//! connection pool and SQLite's own locking.

pub mod conversation;
pub mod dao;
pub mod message;

pub use conversation::ConversationStore;
pub use dao::{Conversation, Message, Role};
pub use message::MessageStore;

use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

/// SQLite-backed conversation and message store.
#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g. `"sqlite://parley.db"`.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// A private in-memory database.
    ///
    /// Every `:memory:` connection is its own database, so the pool is pinned
    /// to a single connection that is never recycled.
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Close every pooled connection.  Later queries fail with
    /// [`sqlx::Error::PoolClosed`].
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

// ── timestamp encoding ────────────────────────────────────────────────────────

/// Current time, truncated to the precision the store keeps.
pub(crate) fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Fixed-width RFC 3339 so that lexical order is chronological order.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// A stored timestamp that does not parse is corrupt data, reported as a
/// decode error like any other malformed column.
pub(crate) fn decode_ts(raw: &str) -> Result<DateTime<Utc>, sqlx::Error> {
    raw.parse()
        .map_err(|e: chrono::ParseError| sqlx::Error::Decode(format!("invalid timestamp '{raw}': {e}").into()))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encoded_timestamps_sort_chronologically() {
        let a: DateTime<Utc> = "2025-03-01T10:00:00Z".parse().unwrap();
        let b: DateTime<Utc> = "2025-03-01T10:00:00.5Z".parse().unwrap();
        let c: DateTime<Utc> = "2025-03-01T10:00:01Z".parse().unwrap();
        let mut encoded = vec![encode_ts(&c), encode_ts(&a), encode_ts(&b)];
        encoded.sort();
        assert_eq!(encoded, vec![encode_ts(&a), encode_ts(&b), encode_ts(&c)]);
    }

    #[test]
    fn timestamp_round_trips_at_store_precision() {
        let ts = now();
        assert_eq!(decode_ts(&encode_ts(&ts)).unwrap(), ts);
    }

    #[test]
    fn unparseable_timestamp_is_a_decode_error() {
        assert!(matches!(decode_ts("yesterday"), Err(sqlx::Error::Decode(_))));
    }

    #[tokio::test]
    async fn in_memory_store_runs_migrations() {
        let store = SqliteStore::in_memory().await.expect("in-memory store");
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM conversations")
            .fetch_one(&store.pool)
            .await
            .expect("conversations table");
        assert_eq!(count, 0);
    }
}
