//! Generation backends.
//!
//! A backend takes the ordered, role-tagged turns of a conversation and
//! returns a stream of text fragments that ends when generation completes.
//! The relay holds one backend behind `Arc<dyn GenerationBackend>`, built
//! once at startup and shared by every request.

mod vertex;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use vertex::{VertexGemini, VertexSettings};

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Incremental text fragments, in generation order.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String, BackendError>> + Send>>;

/// Author tag in the backend's own vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    User,
    Model,
}

/// One entry of the context sent to the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub role: TurnRole,
    pub text: String,
}

impl Turn {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: TurnRole::User, text: text.into() }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self { role: TurnRole::Model, text: text.into() }
    }
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// Required configuration is missing; detected at first use.
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Non-success HTTP status from the provider.
    #[error("upstream returned {status}: {body}")]
    Upstream { status: u16, body: String },

    /// The provider reported an error inside an otherwise healthy stream.
    #[error("upstream rejected the request: {0}")]
    Rejected(String),

    #[error("malformed upstream payload: {0}")]
    Malformed(String),

    #[error("no response within {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait GenerationBackend: Send + Sync + 'static {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Open a streaming generation over `turns`.
    async fn stream_generate(&self, turns: Vec<Turn>) -> Result<FragmentStream, BackendError>;
}
