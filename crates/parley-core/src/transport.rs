//! Wire format of the streaming chat response.
//!
//! Each event is one self-delimited record:
//!
//! ```text
//! data: {"type":"text","text":"Hel"}\n\n
//! data: {"type":"text","text":"lo"}\n\n
//! data: {"type":"done","conversationId":"6f1c…"}\n\n
//! ```
//!
//! Records are independent.  A decoder that cannot parse one drops it and
//! carries on with the next.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::sse::SseFrameBuffer;

/// One event of a chat turn, in emission order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamEvent {
    /// One generated fragment (not the cumulative text).
    Text { text: String },
    /// Generation finished and the assistant turn is stored.
    Done {
        #[serde(rename = "conversationId")]
        conversation_id: String,
    },
    /// Generation or persistence failed.  The message is user-facing.
    Error { error: String },
}

impl StreamEvent {
    pub fn text(fragment: impl Into<String>) -> Self {
        StreamEvent::Text { text: fragment.into() }
    }

    pub fn done(conversation_id: impl Into<String>) -> Self {
        StreamEvent::Done { conversation_id: conversation_id.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamEvent::Error { error: message.into() }
    }

    /// `done` and `error` end a turn; nothing follows them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, StreamEvent::Text { .. })
    }
}

/// Encode one event as a `data: <json>\n\n` record.
pub fn encode_frame(event: &StreamEvent) -> Bytes {
    let json = serde_json::to_string(event).unwrap_or_else(|e| {
        // Unreachable for this enum; an empty record is dropped by decoders.
        error!(error = %e, "failed to serialise stream event");
        String::new()
    });
    Bytes::from(format!("data: {json}\n\n"))
}

/// Incremental decoder for [`encode_frame`] output.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    frames: SseFrameBuffer,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete record in `chunk` (plus any held-back prefix).
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.frames.feed(chunk).iter().filter_map(|p| parse(p)).collect()
    }

    /// Decode a final record that arrived without its delimiter.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        self.frames.finish().as_deref().and_then(parse)
    }
}

fn parse(payload: &str) -> Option<StreamEvent> {
    match serde_json::from_str(payload) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!(error = %e, payload_len = payload.len(), "dropping unparseable frame");
            None
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn encodes_the_documented_json_shapes() {
        assert_eq!(
            encode_frame(&StreamEvent::text("Hi")),
            Bytes::from_static(b"data: {\"type\":\"text\",\"text\":\"Hi\"}\n\n")
        );
        assert_eq!(
            encode_frame(&StreamEvent::done("c1")),
            Bytes::from_static(b"data: {\"type\":\"done\",\"conversationId\":\"c1\"}\n\n")
        );
        assert_eq!(
            encode_frame(&StreamEvent::error("oops")),
            Bytes::from_static(b"data: {\"type\":\"error\",\"error\":\"oops\"}\n\n")
        );
    }

    #[test]
    fn fragment_newlines_stay_inside_one_record() {
        let frame = encode_frame(&StreamEvent::text("line one\n\nline two"));
        let mut decoder = FrameDecoder::new();
        assert_eq!(decoder.feed(&frame), vec![StreamEvent::text("line one\n\nline two")]);
    }

    #[test]
    fn decodes_across_every_possible_chunk_boundary() {
        let events = vec![
            StreamEvent::text("こん"),
            StreamEvent::text("にちは"),
            StreamEvent::done("conv-9"),
        ];
        let wire: Vec<u8> = events.iter().flat_map(|e| encode_frame(e).to_vec()).collect();

        for cut in 0..=wire.len() {
            let mut decoder = FrameDecoder::new();
            let mut out = decoder.feed(&wire[..cut]);
            out.extend(decoder.feed(&wire[cut..]));
            assert_eq!(out, events, "cut at byte {cut}");
        }
    }

    #[test]
    fn unparseable_record_is_skipped() {
        let mut decoder = FrameDecoder::new();
        let mut wire = b"data: {not json}\n\ndata: {\"type\":\"mystery\"}\n\n".to_vec();
        wire.extend_from_slice(&encode_frame(&StreamEvent::text("ok")));
        assert_eq!(decoder.feed(&wire), vec![StreamEvent::text("ok")]);
    }

    #[test]
    fn terminal_events() {
        assert!(!StreamEvent::text("x").is_terminal());
        assert!(StreamEvent::done("c").is_terminal());
        assert!(StreamEvent::error("e").is_terminal());
    }
}
