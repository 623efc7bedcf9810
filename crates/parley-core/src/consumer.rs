//! Client side of the chat stream.
//!
//! Turns the raw response body into updates for a single in-progress
//! assistant message.  Every `text` frame produces the new cumulative text at
//! once; nothing is batched.  After an `error` frame the visible text becomes
//! the failure notice and later `text` frames are ignored, but reading
//! continues until the server closes the stream.

use std::pin::pin;

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::transport::{FrameDecoder, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsumerUpdate {
    /// Cumulative assistant text so far.
    Content(String),
    /// The server created a conversation and this is its id.  Only emitted
    /// when no id was known beforehand.
    ConversationAssigned(String),
    /// The turn failed; the notice replaces the assistant text.
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerOutcome {
    /// What the user ends up seeing: the reply, or the failure notice.
    pub content: String,
    pub conversation_id: Option<String>,
    pub failed: bool,
}

#[derive(Debug)]
pub struct StreamConsumer {
    decoder: FrameDecoder,
    conversation_id: Option<String>,
    failure_notice: String,
    content: String,
    failed: bool,
}

impl StreamConsumer {
    pub fn new(known_conversation_id: Option<String>, failure_notice: impl Into<String>) -> Self {
        Self {
            decoder: FrameDecoder::new(),
            conversation_id: known_conversation_id,
            failure_notice: failure_notice.into(),
            content: String::new(),
            failed: false,
        }
    }

    /// Visible assistant text.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    /// Decode one network chunk.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ConsumerUpdate> {
        self.decoder
            .feed(chunk)
            .into_iter()
            .filter_map(|event| self.apply(event))
            .collect()
    }

    /// End of stream: flush a trailing frame and report the result.
    pub fn finish(mut self) -> (ConsumerOutcome, Option<ConsumerUpdate>) {
        let last = self.decoder.finish().and_then(|event| self.apply(event));
        let outcome = ConsumerOutcome {
            content: self.content,
            conversation_id: self.conversation_id,
            failed: self.failed,
        };
        (outcome, last)
    }

    /// Read `body` to the end, reporting each update as it happens.
    ///
    /// A transport error aborts the read and is returned as is.
    pub async fn consume<S, B, E, F>(mut self, body: S, mut on_update: F) -> Result<ConsumerOutcome, E>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        F: FnMut(&ConsumerUpdate),
    {
        let mut body = pin!(body);
        while let Some(chunk) = body.next().await {
            for update in self.feed(chunk?.as_ref()) {
                on_update(&update);
            }
        }
        let (outcome, last) = self.finish();
        if let Some(update) = last {
            on_update(&update);
        }
        Ok(outcome)
    }

    fn apply(&mut self, event: StreamEvent) -> Option<ConsumerUpdate> {
        match event {
            StreamEvent::Text { text } => {
                if self.failed {
                    debug!("ignoring text after error frame");
                    return None;
                }
                self.content.push_str(&text);
                Some(ConsumerUpdate::Content(self.content.clone()))
            }
            StreamEvent::Done { conversation_id } => {
                if self.conversation_id.is_some() {
                    return None;
                }
                self.conversation_id = Some(conversation_id.clone());
                Some(ConsumerUpdate::ConversationAssigned(conversation_id))
            }
            StreamEvent::Error { error } => {
                debug!(server_message = %error, "stream reported an error");
                self.failed = true;
                self.content = self.failure_notice.clone();
                Some(ConsumerUpdate::Failed(self.failure_notice.clone()))
            }
        }
    }
}
