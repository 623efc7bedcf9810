//! Request body extraction.
//!
//! Chat and rename bodies are read leniently: the content type is not
//! checked, a blank body counts as `{}` (so a missing field surfaces as the
//! field's own 400 message), and anything that is not valid JSON for the
//! target type is a 400 with the localized "invalid body" message.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ServerError;
use crate::state::AppState;

pub struct LenientJson<T>(pub T);

impl<T> FromRequest<Arc<AppState>> for LenientJson<T>
where
    T: DeserializeOwned,
{
    type Rejection = ServerError;

    async fn from_request(req: Request, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let locale = state.locale();
        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            debug!(error = %e, "failed to read request body");
            ServerError::BadRequest(locale.invalid_body().to_owned())
        })?;
        parse(&bytes).map(LenientJson).map_err(|e| {
            debug!(error = %e, "rejecting request body");
            ServerError::BadRequest(locale.invalid_body().to_owned())
        })
    }
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, serde_json::Error> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        serde_json::from_slice(b"{}")
    } else {
        serde_json::from_slice(bytes)
    }
}
