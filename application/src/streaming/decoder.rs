//! Incremental SSE decoder
//!
//! Accepts raw byte chunks as they arrive and emits [`StreamEvent`]s only for
//! fully framed records. Incomplete trailing bytes (including a multi-byte
//! character split across reads) stay buffered until the next chunk.

use serde_json::Value;
use thinking_domain::StreamEvent;
use thiserror::Error;
use tracing::{debug, warn};

/// Upper bound for one record still waiting for its terminating blank line.
pub const MAX_PENDING_RECORD_BYTES: usize = 4 * 1024 * 1024;

const DONE_SENTINEL: &str = "[DONE]";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("SSE record exceeded maximum size (4 MiB)")]
    RecordTooLarge,
}

/// Per-call SSE decoder.
///
/// After the first terminal event (`done` or `error`) every later byte is
/// ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    /// Prefix of `buffer` already searched for a record boundary
    scanned: usize,
    malformed: usize,
    terminated: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk and return the events of every record it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<StreamEvent>, DecodeError> {
        if self.terminated {
            return Ok(Vec::new());
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some((pos, delim_len)) = find_record_boundary(&self.buffer, self.scanned) {
            let record: Vec<u8> = self.buffer.drain(..pos + delim_len).take(pos).collect();
            self.scanned = 0;
            self.decode_record(&record, &mut events);
            if self.terminated {
                self.buffer.clear();
                return Ok(events);
            }
        }
        // A separator may straddle the next chunk
        self.scanned = self.buffer.len().saturating_sub(MAX_DELIMITER_LEN - 1);

        if self.buffer.len() > MAX_PENDING_RECORD_BYTES {
            self.buffer.clear();
            self.terminated = true;
            return Err(DecodeError::RecordTooLarge);
        }
        Ok(events)
    }

    /// Transport ended: decode whatever is left as a final record.
    ///
    /// A backend that closes the connection right after its last `data:`
    /// line, without the blank-line separator, still gets that record read.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if self.terminated {
            return events;
        }
        let rest = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        if !rest.iter().all(u8::is_ascii_whitespace) {
            self.decode_record(&rest, &mut events);
        }
        events
    }

    /// Whether a terminal event has been emitted.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Number of records skipped because they were not valid JSON.
    pub fn malformed_records(&self) -> usize {
        self.malformed
    }

    fn decode_record(&mut self, record: &[u8], events: &mut Vec<StreamEvent>) {
        if record.is_empty() {
            return;
        }
        let Ok(record) = std::str::from_utf8(record) else {
            self.malformed += 1;
            warn!(bytes = record.len(), "Skipping SSE record with invalid UTF-8");
            return;
        };
        let Some(data) = extract_data(record) else {
            return;
        };

        if data.trim() == DONE_SENTINEL {
            self.emit(StreamEvent::Done, events);
            return;
        }

        match serde_json::from_str::<Value>(&data) {
            Ok(json) => {
                for event in interpret_payload(&json) {
                    self.emit(event, events);
                    if self.terminated {
                        return;
                    }
                }
            }
            Err(e) => {
                self.malformed += 1;
                warn!(%e, payload_bytes = data.len(), "Skipping malformed SSE record");
            }
        }
    }

    fn emit(&mut self, event: StreamEvent, events: &mut Vec<StreamEvent>) {
        if event.is_terminal() {
            self.terminated = true;
        }
        events.push(event);
    }
}

const MAX_DELIMITER_LEN: usize = 4;

/// Earliest record separator at or after `from`, as `(offset, length)`.
fn find_record_boundary(buffer: &[u8], from: usize) -> Option<(usize, usize)> {
    let tail = buffer.get(from..)?;
    let lf = tail.windows(2).position(|w| w == b"\n\n");
    let crlf = tail.windows(4).position(|w| w == b"\r\n\r\n");
    let (pos, len) = match (lf, crlf) {
        (Some(a), Some(b)) if b < a => (b, 4),
        (Some(a), _) => (a, 2),
        (None, Some(b)) => (b, 4),
        (None, None) => return None,
    };
    Some((from + pos, len))
}

/// Join the `data:` lines of one record; other fields and comments are
/// dropped.
fn extract_data(record: &str) -> Option<String> {
    let mut data = String::new();
    let mut found = false;

    for line in record.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(mut rest) = line.strip_prefix("data:") {
            if let Some(stripped) = rest.strip_prefix(' ') {
                rest = stripped;
            }
            if found {
                data.push('\n');
            }
            data.push_str(rest);
            found = true;
        }
    }

    if found { Some(data) } else { None }
}

/// Map one JSON payload to zero or more events.
///
/// Accepted shapes:
/// - `{"content": "..."}` → delta (empty content is a keep-alive)
/// - `{"error": "message"}` or `{"content": "message", "error": true}` → error
/// - `{"done": true}` → terminal marker, preceded by a delta if it also
///   carries content
fn interpret_payload(json: &Value) -> Vec<StreamEvent> {
    let Some(object) = json.as_object() else {
        debug!("Ignoring non-object SSE payload");
        return Vec::new();
    };
    let content = object
        .get("content")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match object.get("error") {
        Some(Value::String(message)) => return vec![StreamEvent::Error(message.clone())],
        Some(Value::Bool(true)) => {
            let message = if content.is_empty() {
                "unknown backend error"
            } else {
                content
            };
            return vec![StreamEvent::Error(message.to_string())];
        }
        _ => {}
    }

    let mut events = Vec::new();
    if !content.is_empty() {
        events.push(StreamEvent::Delta(content.to_string()));
    }
    if object.get("done").and_then(Value::as_bool).unwrap_or(false) {
        events.push(StreamEvent::Done);
    }
    events
}
