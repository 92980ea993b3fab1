//! Incremental framing of a chunked event-stream body.
//!
//! Accepts server-sent events (`data:` lines terminated by a blank line) and
//! newline-delimited JSON, which some gateways emit instead. Bytes are held
//! only until a line is complete, so a frame is handed out as soon as its
//! terminating newline arrives.

use std::str::Utf8Error;

/// End-of-stream sentinel some backends send as a final frame.
pub const DONE_SENTINEL: &str = "[DONE]";

/// One framed unit, still undecoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Complete event payload.
    Data(String),
    /// The line bytes were not valid UTF-8.
    Invalid(String),
}

/// Splits a byte stream into [`Frame`]s.
#[derive(Debug, Default)]
pub struct SseFramer {
    /// Bytes after the last newline.
    pending: Vec<u8>,
    /// `data:` lines of the event being assembled.
    data: Vec<String>,
}

impl SseFramer {
    /// Create an empty framer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes, returning every frame they complete, in order.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let Self { pending, data } = self;
        pending.extend_from_slice(bytes);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = pending[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            match std::str::from_utf8(strip_cr(&pending[start..end])) {
                Ok(line) => process_line(data, line, &mut frames),
                Err(e) => frames.push(invalid(&e)),
            }
            start = end + 1;
        }
        pending.drain(..start);
        frames
    }

    /// Flush whatever is buffered once the body has ended.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        let rest = std::mem::take(&mut self.pending);
        if !rest.is_empty() {
            match std::str::from_utf8(strip_cr(&rest)) {
                Ok(line) => process_line(&mut self.data, line, &mut frames),
                Err(e) => frames.push(invalid(&e)),
            }
        }
        dispatch(&mut self.data, &mut frames);
        frames
    }
}

fn process_line(data: &mut Vec<String>, line: &str, frames: &mut Vec<Frame>) {
    if line.is_empty() {
        dispatch(data, frames);
        return;
    }
    if line.starts_with(':') {
        return;
    }
    if let Some(value) = field_value(line, "data") {
        data.push(value.to_string());
        return;
    }
    if ["event", "id", "retry"]
        .iter()
        .any(|field| field_value(line, field).is_some())
    {
        return;
    }

    // A bare line is a self-contained frame.
    dispatch(data, frames);
    push_data(frames, line.trim().to_string());
}

fn dispatch(data: &mut Vec<String>, frames: &mut Vec<Frame>) {
    if data.is_empty() {
        return;
    }
    let payload = data.join("\n");
    data.clear();
    push_data(frames, payload);
}

fn push_data(frames: &mut Vec<Frame>, payload: String) {
    if payload.trim().is_empty() || payload.trim() == DONE_SENTINEL {
        return;
    }
    frames.push(Frame::Data(payload));
}

/// Value of `field` on an SSE line, with the single optional space removed.
/// A line holding only the field name has an empty value.
fn field_value<'a>(line: &'a str, field: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(field)?;
    if rest.is_empty() {
        return Some(rest);
    }
    let rest = rest.strip_prefix(':')?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

fn strip_cr(line: &[u8]) -> &[u8] {
    line.strip_suffix(b"\r").unwrap_or(line)
}

fn invalid(error: &Utf8Error) -> Frame {
    Frame::Invalid(format!("invalid UTF-8 in stream: {error}"))
}
