//! Byte-level Server-Sent Events framing.
//!
//! A frame is a run of lines terminated by a blank line (`\n\n` or
//! `\r\n\r\n`).  Network chunks do not line up with frames, so bytes are
//! buffered until a full frame is present.  Buffering happens on raw bytes, so
//! a multi-byte UTF-8 sequence split across two chunks is reassembled before
//! it is decoded.
//!
//! Used for both directions: decoding our own wire frames on the client side
//! and decoding the generation backend's SSE response on the server side.

use std::mem;

#[derive(Debug, Default)]
pub struct SseFrameBuffer {
    buf: Vec<u8>,
    /// Bytes of `buf` already searched for a delimiter.
    scanned: usize,
    /// Start of the line containing `scanned`.
    line_start: usize,
}

impl SseFrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `chunk` and return the `data` payload of every frame it
    /// completed, in order.  Frames without a `data` field yield nothing.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(chunk);
        let mut payloads = Vec::new();
        while let Some((frame_len, consumed)) = self.next_frame() {
            if let Some(data) = frame_data(&self.buf[..frame_len]) {
                payloads.push(data);
            }
            self.buf.drain(..consumed);
            self.scanned = 0;
            self.line_start = 0;
        }
        payloads
    }

    /// Flush a trailing frame that was never terminated by a blank line.
    pub fn finish(&mut self) -> Option<String> {
        let rest = mem::take(&mut self.buf);
        self.scanned = 0;
        self.line_start = 0;
        frame_data(&rest)
    }

    /// Bytes held back waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Locate the first blank line, resuming where the previous call stopped.
    /// Returns the length of the frame before it and the number of bytes to
    /// consume including the blank line.
    fn next_frame(&mut self) -> Option<(usize, usize)> {
        while let Some(offset) = self.buf[self.scanned..].iter().position(|b| *b == b'\n') {
            let i = self.scanned + offset;
            self.scanned = i + 1;
            let line = &self.buf[self.line_start..i];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            if line.is_empty() {
                return Some((self.line_start, i + 1));
            }
            self.line_start = i + 1;
        }
        self.scanned = self.buf.len();
        None
    }
}

/// Join the frame's `data:` lines with `\n`; other fields are ignored.
fn frame_data(frame: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(frame);
    let mut data: Option<String> = None;
    for line in text.lines() {
        let Some(value) = line.strip_prefix("data:") else {
            continue;
        };
        let value = value.strip_prefix(' ').unwrap_or(value);
        match data.as_mut() {
            Some(d) => {
                d.push('\n');
                d.push_str(value);
            }
            None => data = Some(value.to_owned()),
        }
    }
    data.filter(|d| !d.trim().is_empty())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn several_frames_in_one_chunk() {
        let mut buf = SseFrameBuffer::new();
        let out = buf.feed(b"data: one\n\ndata: two\n\n");
        assert_eq!(out, vec!["one", "two"]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn frame_split_across_chunks_is_held_back() {
        let mut buf = SseFrameBuffer::new();
        assert!(buf.feed(b"data: {\"a\":").is_empty());
        assert!(buf.feed(b"1}\n").is_empty());
        assert_eq!(buf.feed(b"\n"), vec!["{\"a\":1}"]);
    }

    #[test]
    fn crlf_delimiters_are_accepted() {
        let mut buf = SseFrameBuffer::new();
        assert_eq!(buf.feed(b"data: x\r\n\r\ndata: y\r\n\r\n"), vec!["x", "y"]);
    }

    #[test]
    fn utf8_sequence_split_between_chunks() {
        let bytes = "data: こんにちは\n\n".as_bytes();
        // Cut inside the first multi-byte character.
        let (a, b) = bytes.split_at(7);
        let mut buf = SseFrameBuffer::new();
        assert!(buf.feed(a).is_empty());
        assert_eq!(buf.feed(b), vec!["こんにちは"]);
    }

    #[test]
    fn non_data_fields_and_comments_are_ignored() {
        let mut buf = SseFrameBuffer::new();
        let out = buf.feed(b": keep-alive\n\nevent: ping\nid: 4\n\ndata: real\n\n");
        assert_eq!(out, vec!["real"]);
    }

    #[test]
    fn multi_line_data_is_joined() {
        let mut buf = SseFrameBuffer::new();
        assert_eq!(buf.feed(b"data: a\ndata: b\n\n"), vec!["a\nb"]);
    }

    #[test]
    fn long_frame_fed_bytewise_is_scanned_once() {
        let payload = "x".repeat(4096);
        let wire = format!("data: {payload}\r\n\r\n");
        let mut buf = SseFrameBuffer::new();
        let mut out = Vec::new();
        for byte in wire.as_bytes() {
            out.extend(buf.feed(std::slice::from_ref(byte)));
            // Everything held back has already been searched.
            assert_eq!(buf.scanned, buf.pending());
        }
        assert_eq!(out, vec![payload]);
        assert_eq!(buf.pending(), 0);
    }

    #[test]
    fn finish_flushes_unterminated_frame() {
        let mut buf = SseFrameBuffer::new();
        assert!(buf.feed(b"data: tail").is_empty());
        assert_eq!(buf.finish().as_deref(), Some("tail"));
        assert_eq!(buf.finish(), None);
    }
}
