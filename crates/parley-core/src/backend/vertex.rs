//! Gemini on Google Vertex AI.
//!
//! Streams `:streamGenerateContent?alt=sse`; every SSE record carries a
//! partial `GenerateContentResponse` whose first candidate's first text part
//! is forwarded as one fragment.
//!
//! Configuration is read once into [`VertexSettings`] and validated on the
//! first generation call, so a server without `GCP_PROJECT_ID` still starts
//! and serves its history endpoints.
//!
//! Authentication uses Application Default Credentials: the GCE/Cloud Run
//! metadata server first, then `gcloud auth application-default
//! print-access-token`.  `GCP_ACCESS_TOKEN` short-circuits both.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, stream};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tokio::sync::RwLock;
use tracing::{debug, error, info, instrument};

use super::{BackendError, FragmentStream, GenerationBackend, Turn, TurnRole};
use crate::sse::SseFrameBuffer;

pub const DEFAULT_LOCATION: &str = "us-central1";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";
pub const MAX_OUTPUT_TOKENS: u32 = 4096;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens live an hour; refresh five minutes early.
const TOKEN_LIFETIME: Duration = Duration::from_secs(55 * 60);

#[derive(Debug, Clone)]
pub struct VertexSettings {
    pub project_id: Option<String>,
    pub location: String,
    pub model: String,
    pub max_output_tokens: u32,
    /// Pre-issued bearer token; skips credential discovery when set.
    pub access_token: Option<String>,
}

impl Default for VertexSettings {
    fn default() -> Self {
        Self {
            project_id: None,
            location: DEFAULT_LOCATION.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
            max_output_tokens: MAX_OUTPUT_TOKENS,
            access_token: None,
        }
    }
}

impl VertexSettings {
    /// Read `GCP_PROJECT_ID`, `GCP_LOCATION`, `PARLEY_MODEL` and
    /// `GCP_ACCESS_TOKEN`.  Nothing is validated here.
    pub fn from_env() -> Self {
        let non_empty = |key: &str| std::env::var(key).ok().filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            project_id: non_empty("GCP_PROJECT_ID"),
            location: non_empty("GCP_LOCATION").unwrap_or(defaults.location),
            model: non_empty("PARLEY_MODEL").unwrap_or(defaults.model),
            max_output_tokens: defaults.max_output_tokens,
            access_token: non_empty("GCP_ACCESS_TOKEN"),
        }
    }
}

// ── Wire types ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: TurnRole,
    parts: [TextPart<'a>; 1],
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ResponseChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    error: Option<UpstreamError>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpstreamError {
    message: String,
}

// ── Authentication ────────────────────────────────────────────────────────────

struct CachedToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
}

struct GcpAuth {
    cached: RwLock<Option<CachedToken>>,
    client: Client,
}

impl GcpAuth {
    fn new(client: Client) -> Self {
        Self { cached: RwLock::new(None), client }
    }

    async fn token(&self) -> Result<String, BackendError> {
        if let Some(cached) = self.cached.read().await.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
        }

        let token = self.fetch().await?;
        *self.cached.write().await = Some(CachedToken {
            token: token.clone(),
            expires_at: Instant::now() + TOKEN_LIFETIME,
        });
        Ok(token)
    }

    async fn fetch(&self) -> Result<String, BackendError> {
        match self.from_metadata_server().await {
            Ok(token) => {
                debug!("obtained GCP token from metadata server");
                return Ok(token);
            }
            Err(e) => debug!(error = %e, "metadata server unavailable"),
        }
        let token = self.from_gcloud().await?;
        debug!("obtained GCP token from gcloud");
        Ok(token)
    }

    async fn from_metadata_server(&self) -> Result<String, BackendError> {
        let response = self
            .client
            .get(METADATA_TOKEN_URL)
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(2))
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(BackendError::Auth(format!(
                "metadata server returned {}",
                response.status()
            )));
        }
        let body: MetadataTokenResponse = response.json().await?;
        Ok(body.access_token)
    }

    async fn from_gcloud(&self) -> Result<String, BackendError> {
        let output = Command::new("gcloud")
            .args(["auth", "application-default", "print-access-token"])
            .output()
            .await
            .map_err(|e| BackendError::Auth(format!("failed to run gcloud: {e}")))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(BackendError::Auth(format!("gcloud auth failed: {}", stderr.trim())));
        }
        let token = String::from_utf8_lossy(&output.stdout).trim().to_owned();
        if token.is_empty() {
            return Err(BackendError::Auth("gcloud returned an empty token".into()));
        }
        Ok(token)
    }
}

// ── Backend ───────────────────────────────────────────────────────────────────

pub struct VertexGemini {
    settings: VertexSettings,
    client: Client,
    auth: GcpAuth,
}

impl VertexGemini {
    pub fn new(settings: VertexSettings) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|e| {
                error!(error = %e, "failed to build tuned HTTP client; using defaults");
                Client::new()
            });
        info!(
            location = %settings.location,
            model = %settings.model,
            project_configured = settings.project_id.is_some(),
            "Vertex AI backend constructed"
        );
        Self { auth: GcpAuth::new(client.clone()), client, settings }
    }

    fn stream_url(&self, project_id: &str) -> String {
        format!(
            "https://{location}-aiplatform.googleapis.com/v1/projects/{project_id}/locations/{location}/publishers/google/models/{model}:streamGenerateContent?alt=sse",
            location = self.settings.location,
            model = self.settings.model,
        )
    }

    async fn bearer(&self) -> Result<String, BackendError> {
        match &self.settings.access_token {
            Some(token) => Ok(token.clone()),
            None => self.auth.token().await,
        }
    }
}

impl fmt::Debug for VertexGemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VertexGemini")
            .field("project_id", &self.settings.project_id)
            .field("location", &self.settings.location)
            .field("model", &self.settings.model)
            .finish_non_exhaustive()
    }
}

fn build_request(turns: &[Turn], max_output_tokens: u32) -> GenerateRequest<'_> {
    GenerateRequest {
        contents: turns
            .iter()
            .map(|t| Content { role: t.role, parts: [TextPart { text: &t.text }] })
            .collect(),
        generation_config: GenerationConfig { max_output_tokens },
    }
}

/// One SSE payload to at most one fragment.  Chunks without text (metadata,
/// safety ratings, the final usage record) produce nothing.
fn parse_chunk(payload: &str) -> Option<Result<String, BackendError>> {
    let chunk: ResponseChunk = match serde_json::from_str(payload) {
        Ok(c) => c,
        Err(e) => return Some(Err(BackendError::Malformed(e.to_string()))),
    };
    if let Some(err) = chunk.error {
        return Some(Err(BackendError::Rejected(err.message)));
    }
    chunk
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text)
        .filter(|t| !t.is_empty())
        .map(Ok)
}

struct SseState<S> {
    bytes: Pin<Box<S>>,
    frames: SseFrameBuffer,
    pending: VecDeque<Result<String, BackendError>>,
    ended: bool,
}

/// Turn the raw response body into fragments.  A transport error ends the
/// stream after being yielded once.
fn fragment_stream<S>(byte_stream: S) -> FragmentStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let state = SseState {
        bytes: Box::pin(byte_stream),
        frames: SseFrameBuffer::new(),
        pending: VecDeque::new(),
        ended: false,
    };
    Box::pin(stream::unfold(state, |mut st| async move {
        loop {
            if let Some(item) = st.pending.pop_front() {
                return Some((item, st));
            }
            if st.ended {
                return None;
            }
            match st.bytes.next().await {
                Some(Ok(chunk)) => {
                    for payload in st.frames.feed(&chunk) {
                        st.pending.extend(parse_chunk(&payload));
                    }
                }
                Some(Err(e)) => {
                    st.ended = true;
                    return Some((Err(BackendError::Request(e)), st));
                }
                None => {
                    st.ended = true;
                    if let Some(payload) = st.frames.finish() {
                        st.pending.extend(parse_chunk(&payload));
                    }
                }
            }
        }
    }))
}

#[async_trait]
impl GenerationBackend for VertexGemini {
    fn name(&self) -> &'static str {
        "vertex-gemini"
    }

    #[instrument(skip_all, fields(model = %self.settings.model, turns = turns.len()))]
    async fn stream_generate(&self, turns: Vec<Turn>) -> Result<FragmentStream, BackendError> {
        let project_id = self
            .settings
            .project_id
            .as_deref()
            .ok_or_else(|| BackendError::NotConfigured("GCP_PROJECT_ID is not set".into()))?;
        let token = self.bearer().await?;

        let response = self
            .client
            .post(self.stream_url(project_id))
            .bearer_auth(token)
            .json(&build_request(&turns, self.settings.max_output_tokens))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, body = %body, "Vertex AI rejected the stream request");
            return Err(BackendError::Upstream { status: status.as_u16(), body });
        }

        debug!("Vertex AI stream opened");
        Ok(fragment_stream(response.bytes_stream()))
    }
}

// ── Tests ──────────────────────────────────────────────────────────────────────
