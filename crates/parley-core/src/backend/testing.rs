//! A generation backend that replays a fixed script.
//!
//! Compiled for this crate's tests and for downstream crates that enable the
//! `test-util` feature.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, stream};

use super::{BackendError, FragmentStream, GenerationBackend, Turn};

#[derive(Debug, Clone)]
enum Ending {
    /// Stream ends normally after the fragments.
    Complete,
    /// Stream yields an error after the fragments.
    Fail(String),
    /// Stream never yields again after the fragments.
    Stall,
}

#[derive(Debug)]
pub struct ScriptedBackend {
    fragments: Vec<String>,
    ending: Ending,
    open_error: Option<String>,
    fragment_delay: Option<Duration>,
    received: Mutex<Vec<Vec<Turn>>>,
}

impl ScriptedBackend {
    fn with(fragments: &[&str], ending: Ending) -> Self {
        Self {
            fragments: fragments.iter().map(|f| (*f).to_owned()).collect(),
            ending,
            open_error: None,
            fragment_delay: None,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Yields `fragments` and completes.
    pub fn replying(fragments: &[&str]) -> Self {
        Self::with(fragments, Ending::Complete)
    }

    /// Yields `fragments`, then fails with `detail`.
    pub fn failing_after(fragments: &[&str], detail: &str) -> Self {
        Self::with(fragments, Ending::Fail(detail.to_owned()))
    }

    /// Fails the call itself, before any stream exists.
    pub fn failing_to_open(detail: &str) -> Self {
        let mut backend = Self::with(&[], Ending::Complete);
        backend.open_error = Some(detail.to_owned());
        backend
    }

    /// Yields `fragments`, then goes silent forever.
    pub fn stalling_after(fragments: &[&str]) -> Self {
        Self::with(fragments, Ending::Stall)
    }

    /// Sleep before every fragment.
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = Some(delay);
        self
    }

    /// The turn lists of every call so far, oldest first.
    pub fn received(&self) -> Vec<Vec<Turn>> {
        self.received.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl GenerationBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn stream_generate(&self, turns: Vec<Turn>) -> Result<FragmentStream, BackendError> {
        if let Ok(mut received) = self.received.lock() {
            received.push(turns);
        }
        if let Some(detail) = &self.open_error {
            return Err(BackendError::Rejected(detail.clone()));
        }

        let delay = self.fragment_delay;
        let body = stream::iter(self.fragments.clone()).then(move |fragment| async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, BackendError>(fragment)
        });

        let stream: FragmentStream = match self.ending.clone() {
            Ending::Complete => Box::pin(body),
            Ending::Fail(detail) => {
                Box::pin(body.chain(stream::once(async move { Err(BackendError::Rejected(detail)) })))
            }
            Ending::Stall => Box::pin(body.chain(stream::pending())),
        };
        Ok(stream)
    }
}
