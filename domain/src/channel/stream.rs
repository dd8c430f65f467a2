//! Streaming events decoded from one backend call.

/// An event in a streaming backend response.
///
/// Produced by the stream decoder from SSE records; consumed by the
/// coalescing buffer of the owning channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A non-empty text fragment.
    Delta(String),
    /// The backend reported an error; the stream is over.
    Error(String),
    /// Explicit terminal marker.
    Done,
}

impl StreamEvent {
    /// Returns the text content if this is a Delta event.
    pub fn text(&self) -> Option<&str> {
        match self {
            StreamEvent::Delta(s) => Some(s),
            _ => None,
        }
    }

    /// Returns true if this event signals the end of the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Error(_) | StreamEvent::Done)
    }
}
