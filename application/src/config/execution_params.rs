//! Execution parameters: orchestration control.
//!
//! [`ExecutionParams`] groups the static parameters that control how the
//! [`Orchestrator`](crate::use_cases::orchestrate::Orchestrator) dispatches
//! and streams. These are application-layer concerns, not domain policy.

use crate::streaming::DEFAULT_FLUSH_INTERVAL;
use std::time::Duration;
use thinking_domain::DEFAULT_MAX_CONTEXT_MESSAGES;

/// Reference per-call timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Upper bound on one backend call from dispatch to its last chunk.
pub const DEFAULT_CALL_DEADLINE: Duration = Duration::from_secs(300);

/// Orchestration control parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionParams {
    /// Period of the shared flush scheduler.
    pub flush_interval: Duration,
    /// Bound on waiting for response headers and on each gap between body
    /// chunks of one backend call.
    pub request_timeout: Duration,
    /// Total time one backend call may take, however steadily it streams.
    pub call_deadline: Duration,
    /// Messages kept per model context.
    pub max_context_messages: usize,
    /// Ask backends for SSE bodies instead of a single JSON reply.
    pub stream: bool,
    /// Whether a summary channel may be created at all.
    pub summary_enabled: bool,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            call_deadline: DEFAULT_CALL_DEADLINE,
            max_context_messages: DEFAULT_MAX_CONTEXT_MESSAGES,
            stream: true,
            summary_enabled: true,
        }
    }
}

impl ExecutionParams {
    // ==================== Builder Methods ====================

    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_call_deadline(mut self, deadline: Duration) -> Self {
        self.call_deadline = deadline;
        self
    }

    pub fn with_max_context_messages(mut self, max: usize) -> Self {
        self.max_context_messages = max;
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn with_summary(mut self, enabled: bool) -> Self {
        self.summary_enabled = enabled;
        self
    }
}
