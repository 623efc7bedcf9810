//! parley-core – the streaming chat relay and everything it talks to.
//!
//! Module map:
//! - [`entities`]  conversation / message records and the SQLite store
//! - [`history`]   conversation CRUD built on the store (cascade delete lives here)
//! - [`context`]   rebuilds the backend's turn list from stored history
//! - [`backend`]   the generation backend trait and the Vertex AI implementation
//! - [`relay`]     the per-request orchestrator driving one chat turn
//! - [`transport`] wire frames pushed over the streaming HTTP response
//! - [`consumer`]  client-side decoding of those frames into a growing message
//! - [`locale`]    user-facing text in the supported languages

pub mod backend;
pub mod consumer;
pub mod context;
pub mod entities;
pub mod error;
pub mod history;
pub mod locale;
pub mod relay;
pub mod sse;
pub mod transport;

pub use backend::{BackendError, FragmentStream, GenerationBackend, Turn, TurnRole};
pub use consumer::{ConsumerOutcome, ConsumerUpdate, StreamConsumer};
pub use entities::{Conversation, Message, Role, SqliteStore};
pub use error::RelayError;
pub use locale::Locale;
pub use relay::{ChatTurn, Relay, RelaySettings, RelayStream};
pub use transport::{FrameDecoder, StreamEvent, encode_frame};
