//! The per-request chat turn.
//!
//! ```text
//! Validating → Resolving → PersistingUser ─┬─ start() returns here
//!                                          ▼
//!                        Streaming {fragment}* → Finalizing → Done
//!                                  └───────────────┴────────→ Erroring
//! ```
//!
//! [`Relay::start`] runs everything up to and including the user-turn write
//! on the caller's task, so validation, lookup and store failures become
//! ordinary HTTP errors.  Generation then runs on a spawned task that owns the
//! accumulator and sends [`StreamEvent`]s over a bounded channel.  The task
//! does not depend on anyone reading: when the client goes away it keeps
//! going and still stores the assistant turn.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use strum::Display;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, info_span};

use crate::backend::{BackendError, GenerationBackend};
use crate::context::build_context;
use crate::entities::dao::derive_title;
use crate::entities::{ConversationStore, MessageStore, Role};
use crate::error::RelayError;
use crate::locale::Locale;
use crate::transport::StreamEvent;

/// Frames buffered between the generation task and the HTTP response.
const EVENT_BUFFER: usize = 64;

pub const DEFAULT_FRAGMENT_TIMEOUT: Duration = Duration::from_secs(60);

/// One inbound chat request, fields exactly as the client sent them.
#[derive(Debug, Clone, Default)]
pub struct ChatTurn {
    pub message: Option<String>,
    pub conversation_id: Option<String>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Bound on opening the backend stream and on each wait for the next
    /// fragment.
    pub fragment_timeout: Duration,
    pub locale: Locale,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self { fragment_timeout: DEFAULT_FRAGMENT_TIMEOUT, locale: Locale::default() }
    }
}

/// Position of a chat turn in its lifecycle.  Ordered; a turn only moves
/// forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
    Validating,
    Resolving,
    PersistingUser,
    Streaming,
    Finalizing,
    Done,
    Erroring,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Done | Phase::Erroring)
    }

    fn advance(&mut self, next: Phase) {
        debug_assert!(next > *self, "phase {self} cannot move to {next}");
        debug!(from = %self, to = %next, "relay phase");
        *self = next;
    }
}

/// A started chat turn.
#[derive(Debug)]
pub struct RelayStream {
    /// The resolved conversation; newly created when the request had none.
    pub conversation_id: String,
    /// Ends after exactly one `done` or `error` event.
    pub events: ReceiverStream<StreamEvent>,
    /// Resolves to the terminal phase once the assistant turn is settled.
    /// Dropping it detaches the task.
    pub finished: JoinHandle<Phase>,
}

pub struct Relay<S> {
    store: Arc<S>,
    backend: Arc<dyn GenerationBackend>,
    settings: RelaySettings,
}

impl<S> fmt::Debug for Relay<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S> Clone for Relay<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            settings: self.settings.clone(),
        }
    }
}

impl<S> Relay<S>
where
    S: ConversationStore + MessageStore,
{
    pub fn new(store: Arc<S>, backend: Arc<dyn GenerationBackend>, settings: RelaySettings) -> Self {
        Self { store, backend, settings }
    }

    pub fn settings(&self) -> &RelaySettings {
        &self.settings
    }

    /// Validate, resolve the conversation and store the user turn, then hand
    /// generation to a background task.
    pub async fn start(&self, turn: ChatTurn) -> Result<RelayStream, RelayError> {
        let locale = self.settings.locale;
        let mut phase = Phase::Validating;

        let non_empty = |v: Option<String>| v.filter(|s| !s.is_empty());
        let (Some(message), Some(session_id)) = (non_empty(turn.message), non_empty(turn.session_id))
        else {
            return Err(RelayError::Validation(locale.message_and_session_required().to_owned()));
        };

        phase.advance(Phase::Resolving);
        let conversation = match non_empty(turn.conversation_id) {
            Some(id) => self
                .store
                .get_conversation(&id)
                .await?
                .ok_or_else(|| RelayError::NotFound(locale.conversation_not_found().to_owned()))?,
            None => {
                let title = derive_title(&message, locale);
                let created = self.store.create_conversation(&session_id, &title).await?;
                info!(conversation_id = %created.id, session_id = %session_id, "conversation created");
                created
            }
        };

        phase.advance(Phase::PersistingUser);
        self.store.append_message(&conversation.id, Role::User, &message).await?;
        debug!(conversation_id = %conversation.id, message_len = message.len(), "user turn persisted");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = GenerationTask {
            store: Arc::clone(&self.store),
            backend: Arc::clone(&self.backend),
            settings: self.settings.clone(),
            conversation_id: conversation.id.clone(),
            tx,
            client_gone: false,
        };
        let span = info_span!("relay", conversation_id = %conversation.id, backend = self.backend.name());
        let finished = tokio::spawn(task.run(phase).instrument(span));

        Ok(RelayStream { conversation_id: conversation.id, events: ReceiverStream::new(rx), finished })
    }
}

// ── Generation task ───────────────────────────────────────────────────────────

struct GenerationTask<S> {
    store: Arc<S>,
    backend: Arc<dyn GenerationBackend>,
    settings: RelaySettings,
    conversation_id: String,
    tx: mpsc::Sender<StreamEvent>,
    client_gone: bool,
}

impl<S> GenerationTask<S>
where
    S: ConversationStore + MessageStore,
{
    async fn run(mut self, mut phase: Phase) -> Phase {
        phase.advance(Phase::Streaming);
        match self.generate(&mut phase).await {
            Ok(()) => phase.advance(Phase::Done),
            Err(e) => {
                error!(error = %e, phase = %phase, "chat turn failed");
                let notice = self.settings.locale.stream_failed();
                self.emit(StreamEvent::error(notice)).await;
                phase.advance(Phase::Erroring);
            }
        }
        info!(phase = %phase, client_gone = self.client_gone, "relay finished");
        phase
    }

    async fn generate(&mut self, phase: &mut Phase) -> Result<(), RelayError> {
        let limit = self.settings.fragment_timeout;
        let turns = build_context(self.store.as_ref(), &self.conversation_id).await?;
        debug!(turns = turns.len(), "context assembled");

        let mut fragments = timeout(limit, self.backend.stream_generate(turns))
            .await
            .map_err(|_| BackendError::Timeout(limit))??;
        debug!("backend stream opened");

        let mut content = String::new();
        let mut count = 0usize;
        loop {
            let next = timeout(limit, fragments.next())
                .await
                .map_err(|_| BackendError::Timeout(limit))?;
            let fragment = match next {
                Some(fragment) => fragment?,
                None => break,
            };
            if fragment.is_empty() {
                continue;
            }
            content.push_str(&fragment);
            count += 1;
            self.emit(StreamEvent::text(fragment)).await;
        }

        phase.advance(Phase::Finalizing);
        self.store.append_message(&self.conversation_id, Role::Assistant, &content).await?;
        info!(fragments = count, content_len = content.len(), "assistant turn persisted");
        self.emit(StreamEvent::done(self.conversation_id.clone())).await;
        Ok(())
    }

    /// Deliver to the client if it is still listening.
    async fn emit(&mut self, event: StreamEvent) {
        if self.client_gone {
            return;
        }
        if self.tx.send(event).await.is_err() {
            debug!("client disconnected; finishing without it");
            self.client_gone = true;
        }
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
