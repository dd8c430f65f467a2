//! Progress notification port
//!
//! Defines the interface for reporting progress while a run streams.

use thinking_domain::{ChannelId, ChannelSnapshot, RunState};

/// Callback for progress updates during a run
///
/// Implementations live in the presentation layer. They only ever see
/// coalesced snapshots, never individual deltas.
pub trait ProgressNotifier: Send + Sync {
    /// Called on every run state transition
    fn on_state(&self, state: RunState);

    /// Called once per flush for each channel that changed, and once more
    /// when the channel turns terminal
    fn on_snapshot(&self, snapshot: &ChannelSnapshot);

    /// Called when a channel is dispatched
    fn on_channel_start(&self, _channel: &ChannelId) {}

    /// Called when the summary precondition does not hold
    fn on_summary_skipped(&self) {}
}

/// No-op progress notifier for when progress reporting is not needed
pub struct NoProgress;

impl ProgressNotifier for NoProgress {
    fn on_state(&self, _state: RunState) {}
    fn on_snapshot(&self, _snapshot: &ChannelSnapshot) {}
}
