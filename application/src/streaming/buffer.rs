//! Coalescing buffer
//!
//! Each [`Channel`] queues incoming deltas and only publishes them when
//! [`Channel::flush`] is called. A single [`FlushScheduler`] per run drives
//! those flushes at a fixed interval, so downstream consumers see at most one
//! update per channel per tick no matter how bursty the backend is.

use std::collections::VecDeque;
use std::time::Duration;
use thinking_domain::{
    ChannelErrorKind, ChannelId, ChannelOutcome, ChannelSnapshot, ChannelState,
};
use tokio::time::{Instant, Interval, MissedTickBehavior, interval_at};
use tracing::trace;

/// Reference flush period.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_millis(300);

/// How a channel's stream ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEnd {
    /// Explicit terminal marker
    Done,
    /// Transport closed without a terminal marker
    EndOfStream,
    Failed {
        kind: ChannelErrorKind,
        message: String,
    },
}

/// Streamed response state for one model (or the summary).
#[derive(Debug)]
pub struct Channel {
    id: ChannelId,
    pending: VecDeque<String>,
    text: String,
    state: ChannelState,
    outcome: Option<ChannelOutcome>,
}

impl Channel {
    pub fn new(id: ChannelId) -> Self {
        Self {
            id,
            pending: VecDeque::new(),
            text: String::new(),
            state: ChannelState::Pending,
            outcome: None,
        }
    }

    pub fn id(&self) -> &ChannelId {
        &self.id
    }

    pub fn state(&self) -> ChannelState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        self.state == ChannelState::Terminal
    }

    /// Text published so far (excludes queued deltas).
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    pub fn outcome(&self) -> Option<&ChannelOutcome> {
        self.outcome.as_ref()
    }

    /// Queue a delta. The first one moves the channel to `Streaming`.
    ///
    /// Returns `true` on that first transition. Deltas for a terminal
    /// channel are dropped.
    pub fn push_delta(&mut self, delta: String) -> bool {
        match self.state {
            ChannelState::Terminal => false,
            ChannelState::Pending => {
                self.state = ChannelState::Streaming;
                self.pending.push_back(delta);
                true
            }
            ChannelState::Streaming => {
                self.pending.push_back(delta);
                false
            }
        }
    }

    /// Append every queued delta, in arrival order, to the published text.
    ///
    /// Returns `true` if anything was appended.
    pub fn flush(&mut self) -> bool {
        if self.pending.is_empty() {
            return false;
        }
        let count = self.pending.len();
        for delta in self.pending.drain(..) {
            self.text.push_str(&delta);
        }
        trace!(channel = %self.id, deltas = count, bytes = self.text.len(), "Flushed channel");
        true
    }

    /// Drain the queue one last time and record the terminal outcome.
    ///
    /// Only the first call has an effect.
    pub fn terminate(&mut self, end: ChannelEnd) -> ChannelOutcome {
        if let Some(outcome) = &self.outcome {
            return outcome.clone();
        }
        self.flush();
        let text = self.text.clone();
        let outcome = match end {
            ChannelEnd::Done => ChannelOutcome::Success { text },
            ChannelEnd::EndOfStream => ChannelOutcome::ImplicitCompletion { text },
            ChannelEnd::Failed { kind, message } => ChannelOutcome::Error {
                kind,
                message,
                partial: text,
            },
        };
        self.state = ChannelState::Terminal;
        self.outcome = Some(outcome.clone());
        outcome
    }

    pub fn snapshot(&self) -> ChannelSnapshot {
        ChannelSnapshot {
            channel_id: self.id.clone(),
            text: self.text.clone(),
            streaming: self.state == ChannelState::Streaming,
            terminal: self.outcome.as_ref().map(ChannelOutcome::status),
            error: self
                .outcome
                .as_ref()
                .and_then(|o| o.error())
                .map(str::to_string),
        }
    }
}

/// Shared tick source for every channel of one run.
///
/// Starts on the first delta, stops once no channel is streaming. While
/// stopped, [`FlushScheduler::tick`] never resolves.
#[derive(Debug)]
pub struct FlushScheduler {
    period: Duration,
    interval: Option<Interval>,
}

impl FlushScheduler {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            interval: None,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Start ticking if not already running. The first tick is one full
    /// period away.
    pub fn ensure_running(&mut self) {
        if self.interval.is_none() {
            let mut interval = interval_at(Instant::now() + self.period, self.period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            self.interval = Some(interval);
            trace!(period_ms = self.period.as_millis() as u64, "Flush scheduler started");
        }
    }

    pub fn stop(&mut self) {
        if self.interval.take().is_some() {
            trace!("Flush scheduler stopped");
        }
    }

    /// Wait for the next tick.
    pub async fn tick(&mut self) {
        match self.interval.as_mut() {
            Some(interval) => {
                interval.tick().await;
            }
            None => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinking_domain::TerminalStatus;

    fn channel() -> Channel {
        Channel::new(ChannelId::Model("m1".parse().unwrap()))
    }

    #[test]
    fn test_flush_concatenates_in_arrival_order() {
        let mut ch = channel();
        for d in ["d1", "+d2", "+d3", "+d4"] {
            ch.push_delta(d.to_string());
        }
        assert_eq!(ch.text(), "");
        assert!(ch.flush());
        assert_eq!(ch.text(), "d1+d2+d3+d4");
        assert!(!ch.has_pending());
    }

    #[test]
    fn test_flush_never_duplicates() {
        let mut ch = channel();
        ch.push_delta("a".to_string());
        ch.flush();
        assert!(!ch.flush());
        ch.push_delta("b".to_string());
        ch.flush();
        assert_eq!(ch.text(), "ab");
    }

    #[test]
    fn test_first_delta_starts_streaming() {
        let mut ch = channel();
        assert_eq!(ch.state(), ChannelState::Pending);
        assert!(ch.push_delta("x".to_string()));
        assert_eq!(ch.state(), ChannelState::Streaming);
        assert!(!ch.push_delta("y".to_string()));
    }

    #[test]
    fn test_terminate_drains_queue_first() {
        let mut ch = channel();
        ch.push_delta("4".to_string());
        let outcome = ch.terminate(ChannelEnd::Done);
        assert_eq!(
            outcome,
            ChannelOutcome::Success {
                text: "4".to_string()
            }
        );
        assert!(ch.is_terminal());
        let snap = ch.snapshot();
        assert_eq!(snap.text, "4");
        assert!(!snap.streaming);
        assert_eq!(snap.terminal, Some(TerminalStatus::Success));
    }

    #[test]
    fn test_terminate_is_first_wins_and_text_frozen() {
        let mut ch = channel();
        ch.push_delta("part".to_string());
        ch.terminate(ChannelEnd::Failed {
            kind: ChannelErrorKind::NetworkFailure,
            message: "timeout".to_string(),
        });
        ch.terminate(ChannelEnd::Done);
        assert!(!ch.push_delta("late".to_string()));
        assert!(!ch.flush());

        let snap = ch.snapshot();
        assert_eq!(snap.terminal, Some(TerminalStatus::Error));
        assert_eq!(snap.error.as_deref(), Some("timeout"));
        assert_eq!(ch.outcome().unwrap().text(), "part");
    }

    #[test]
    fn test_end_of_stream_is_implicit_completion() {
        let mut ch = channel();
        ch.push_delta("maybe cut".to_string());
        let outcome = ch.terminate(ChannelEnd::EndOfStream);
        assert_eq!(outcome.status(), TerminalStatus::ImplicitCompletion);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduler_ticks_after_one_period() {
        let mut scheduler = FlushScheduler::new(DEFAULT_FLUSH_INTERVAL);
        scheduler.ensure_running();
        let start = Instant::now();
        scheduler.tick().await;
        assert_eq!(start.elapsed(), DEFAULT_FLUSH_INTERVAL);
        scheduler.tick().await;
        assert_eq!(start.elapsed(), DEFAULT_FLUSH_INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_scheduler_never_ticks() {
        let mut scheduler = FlushScheduler::new(DEFAULT_FLUSH_INTERVAL);
        assert!(!scheduler.is_running());
        let waited =
            tokio::time::timeout(Duration::from_secs(5), scheduler.tick()).await;
        assert!(waited.is_err());

        scheduler.ensure_running();
        scheduler.stop();
        assert!(!scheduler.is_running());
    }
}
