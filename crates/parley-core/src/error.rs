//! Error taxonomy of a chat turn.
//!
//! `Validation` and `NotFound` are raised before anything is written or
//! streamed.  `Backend` and `Persistence` may occur after the user turn has
//! been stored; once streaming has started they are only ever reported to the
//! client as an opaque `error` frame.

use thiserror::Error;

use crate::backend::BackendError;

#[derive(Debug, Error)]
pub enum RelayError {
    /// A required request field is missing or empty.  Carries the
    /// client-facing message.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The referenced conversation does not exist.  Carries the
    /// client-facing message.
    #[error("not found: {0}")]
    NotFound(String),

    /// The generation call failed or timed out.
    #[error("generation backend failed: {0}")]
    Backend(#[from] BackendError),

    /// A store read or write failed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] sqlx::Error),

    /// Anything else.
    #[error("unexpected: {0}")]
    Unexpected(String),
}

impl RelayError {
    /// `true` for errors the caller can fix by changing the request.
    pub fn is_client_error(&self) -> bool {
        matches!(self, RelayError::Validation(_) | RelayError::NotFound(_))
    }
}
