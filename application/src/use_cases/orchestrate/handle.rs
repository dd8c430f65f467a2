//! Consumer side of a run.

use crate::ports::progress::ProgressNotifier;
use crate::use_cases::summary::SkipReason;
use std::sync::{Arc, Mutex, PoisonError};
use thinking_domain::{ChannelId, ChannelSnapshot, RunResult, RunState};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// What a run reports while it progresses.
#[derive(Debug, Clone)]
pub enum RunUpdate {
    State(RunState),
    ChannelStarted(ChannelId),
    /// Coalesced channel state, published on flush and on terminal
    Snapshot(ChannelSnapshot),
    SummarySkipped(SkipReason),
    /// Last update of a run that was not cancelled
    Finished(RunResult),
}

/// Closable sending side shared by a run and the orchestrator.
///
/// Every send happens under the lock, so once [`UpdateGate::close`] returns
/// no further update can be queued.
#[derive(Clone)]
pub(crate) struct UpdateGate {
    tx: Arc<Mutex<Option<mpsc::UnboundedSender<RunUpdate>>>>,
}

impl UpdateGate {
    pub(crate) fn new(tx: mpsc::UnboundedSender<RunUpdate>) -> Self {
        Self {
            tx: Arc::new(Mutex::new(Some(tx))),
        }
    }

    pub(crate) fn send(&self, update: RunUpdate) -> bool {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.as_ref() {
            Some(tx) => tx.send(update).is_ok(),
            None => false,
        }
    }

    pub(crate) fn close(&self) {
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

/// Stream of [`RunUpdate`]s for one run.
///
/// After the run is cancelled nothing more is yielded, including updates
/// that were already queued.
pub struct RunHandle {
    updates: mpsc::UnboundedReceiver<RunUpdate>,
    cancel: CancellationToken,
}

impl RunHandle {
    pub(crate) fn new(updates: mpsc::UnboundedReceiver<RunUpdate>, cancel: CancellationToken) -> Self {
        Self { updates, cancel }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Next update, or `None` once the run finished or was cancelled.
    pub async fn next(&mut self) -> Option<RunUpdate> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let update = self.updates.recv().await?;
        if self.cancel.is_cancelled() {
            return None;
        }
        Some(update)
    }

    /// Drain the run and return its aggregate (`None` if cancelled).
    pub async fn wait(mut self) -> Option<RunResult> {
        while let Some(update) = self.next().await {
            if let RunUpdate::Finished(result) = update {
                return Some(result);
            }
        }
        None
    }

    /// Like [`RunHandle::wait`], forwarding every update to `progress`.
    pub async fn drive(mut self, progress: &dyn ProgressNotifier) -> Option<RunResult> {
        while let Some(update) = self.next().await {
            match update {
                RunUpdate::State(state) => progress.on_state(state),
                RunUpdate::ChannelStarted(channel) => progress.on_channel_start(&channel),
                RunUpdate::Snapshot(snapshot) => progress.on_snapshot(&snapshot),
                RunUpdate::SummarySkipped(_) => progress.on_summary_skipped(),
                RunUpdate::Finished(result) => return Some(result),
            }
        }
        None
    }
}
