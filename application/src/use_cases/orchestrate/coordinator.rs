//! Per-run coordinator task
//!
//! One coordinator owns every [`Channel`] of a run together with the flush
//! scheduler. It is the only place channel state changes: backend tasks
//! only send [`ChannelEvent`]s, and the coordinator applies them, flushes on
//! ticks, advances the relay, and settles the run.

use super::handle::{RunUpdate, UpdateGate};
use super::RunSlot;
use crate::ports::run_logger::{RunEvent, RunLogger};
use crate::streaming::{Channel, FlushScheduler};
use crate::use_cases::dispatch::{ChannelEvent, ChannelEventKind, RequestDispatcher};
use crate::use_cases::summary::{self, SummaryDecision};
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use thinking_domain::{
    ChannelId, ChannelOutcome, ChannelResult, ChannelSnapshot, ChannelState, ConversationTurn,
    DiscussionContext, Language, LanguageModels, Model, Question, RunMode, RunResult, RunState,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// What a run has to do once started.
pub(crate) enum RunPlan {
    FanOut {
        models: Vec<Model>,
        history: Vec<ConversationTurn>,
    },
    Relay {
        order: Vec<Model>,
        history: Vec<ConversationTurn>,
    },
    /// Only the summary channel, over answers gathered elsewhere
    Summary {
        mode: RunMode,
        responses: BTreeMap<String, String>,
    },
}

/// Everything a coordinator is handed at spawn time.
pub(crate) struct RunContext {
    pub id: u64,
    pub question: Question,
    pub language: Language,
    pub languages: Arc<LanguageModels>,
    pub summary_enabled: bool,
    pub dispatcher: RequestDispatcher,
    pub events: mpsc::UnboundedReceiver<ChannelEvent>,
    pub gate: UpdateGate,
    pub cancel: CancellationToken,
    pub logger: Arc<dyn RunLogger>,
    pub scheduler: FlushScheduler,
    pub slot: RunSlot,
}

enum Step {
    Cancelled,
    Event(Option<ChannelEvent>),
    Tick,
}

pub(crate) struct RunCoordinator {
    ctx: RunContext,
    mode: RunMode,
    state: RunState,
    history: Vec<ConversationTurn>,
    /// Models this run queries, in dispatch order
    run_models: Vec<Model>,
    relay_queue: VecDeque<Model>,
    discussion: Option<DiscussionContext>,
    /// Answers handed in for a summary-only run
    summary_input: Option<BTreeMap<String, String>>,
    channels: Vec<Channel>,
    summary: Option<Channel>,
    skip_summary: bool,
}

impl RunCoordinator {
    pub(crate) fn new(ctx: RunContext, plan: RunPlan) -> Self {
        let mut coordinator = Self {
            ctx,
            mode: RunMode::FanOut,
            state: RunState::Idle,
            history: Vec::new(),
            run_models: Vec::new(),
            relay_queue: VecDeque::new(),
            discussion: None,
            summary_input: None,
            channels: Vec::new(),
            summary: None,
            skip_summary: false,
        };
        match plan {
            RunPlan::FanOut { models, history } => {
                coordinator.run_models = models;
                coordinator.history = history;
            }
            RunPlan::Relay { order, history } => {
                coordinator.mode = RunMode::SequentialRelay;
                coordinator.relay_queue = order.iter().cloned().collect();
                coordinator.run_models = order;
                coordinator.history = history;
                coordinator.discussion = Some(DiscussionContext::new());
            }
            RunPlan::Summary { mode, responses } => {
                coordinator.mode = mode;
                coordinator.run_models = responses.keys().filter_map(|k| k.parse().ok()).collect();
                coordinator.summary_input = Some(responses);
            }
        }
        coordinator
    }

    /// Drive the run to completion. Returns `None` if it was cancelled.
    pub(crate) async fn run(mut self) -> Option<RunResult> {
        self.begin();

        while !self.state.is_finished() {
            let step = tokio::select! {
                biased;
                _ = self.ctx.cancel.cancelled() => Step::Cancelled,
                event = self.ctx.events.recv() => Step::Event(event),
                _ = self.ctx.scheduler.tick() => Step::Tick,
            };

            match step {
                Step::Cancelled => {
                    info!(run = self.ctx.id, "Run cancelled");
                    self.ctx
                        .logger
                        .log(RunEvent::new("run_cancelled", json!({ "run": self.ctx.id })));
                    return None;
                }
                Step::Event(Some(event)) => self.handle_event(event),
                Step::Event(None) => {
                    warn!(run = self.ctx.id, "Channel event queue closed unexpectedly");
                    return None;
                }
                Step::Tick => self.flush_all(),
            }
        }

        let result = self.result();
        info!(
            run = self.ctx.id,
            state = %result.state,
            successes = result.success_count(),
            skip_summary = result.skip_summary,
            "Run finished"
        );
        self.ctx.logger.log(RunEvent::new(
            "run_finished",
            json!({
                "run": self.ctx.id,
                "state": result.state.as_str(),
                "successes": result.success_count(),
                "channels": result.responses.len(),
                "skip_summary": result.skip_summary,
            }),
        ));
        self.publish(RunUpdate::Finished(result.clone()));
        self.ctx.slot.release(self.ctx.id);
        Some(result)
    }

    fn begin(&mut self) {
        info!(
            run = self.ctx.id,
            mode = %self.mode,
            models = self.run_models.len(),
            language = %self.ctx.language,
            "Starting run"
        );
        self.ctx.logger.log(RunEvent::new(
            "run_started",
            json!({
                "run": self.ctx.id,
                "mode": self.mode.as_str(),
                "question": self.ctx.question.content(),
                "language": self.ctx.language.as_str(),
                "models": self.run_models.iter().map(Model::as_str).collect::<Vec<_>>(),
                "summary_only": self.summary_input.is_some(),
            }),
        ));
        self.set_state(RunState::Dispatching);

        if let Some(responses) = self.summary_input.take() {
            self.dispatch_summary(responses);
            return;
        }

        match self.mode {
            RunMode::FanOut => {
                let models = self.run_models.clone();
                for model in &models {
                    let request = self.ctx.dispatcher.chat_request(
                        model,
                        RunMode::FanOut,
                        self.ctx.question.content(),
                        &self.history,
                        &self.ctx.language,
                        None,
                    );
                    self.open_channel(model);
                    self.ctx.dispatcher.dispatch_model(model, request);
                }
            }
            RunMode::SequentialRelay => {
                self.dispatch_next_hop(None);
            }
        }
    }

    /// Dispatch the next relay model, if any.
    fn dispatch_next_hop(&mut self, previous: Option<&ChannelOutcome>) -> bool {
        let Some(model) = self.relay_queue.pop_front() else {
            return false;
        };
        let step = self
            .discussion
            .get_or_insert_with(DiscussionContext::new)
            .advance(model.clone(), previous)
            .clone();

        self.set_state(RunState::Dispatching);
        debug!(
            run = self.ctx.id,
            model = %model,
            previous = ?step.previous_model.as_ref().map(Model::as_str),
            "Dispatching relay hop"
        );
        let request = self.ctx.dispatcher.chat_request(
            &model,
            RunMode::SequentialRelay,
            self.ctx.question.content(),
            &self.history,
            &self.ctx.language,
            Some(&step),
        );
        self.open_channel(&model);
        self.ctx.dispatcher.dispatch_model(&model, request);
        true
    }

    fn dispatch_summary(&mut self, responses: BTreeMap<String, String>) {
        let credentials = self.ctx.dispatcher.credentials();
        let owner = summary::credential_owner(
            &self.ctx.language,
            &self.ctx.languages,
            &self.run_models,
            credentials,
        )
        .cloned();
        let credential = summary::credential_for(owner.as_ref(), credentials);
        let request = self.ctx.dispatcher.summary_request(
            responses,
            self.ctx.question.content(),
            &self.ctx.language,
            owner.as_ref(),
        );

        self.summary = Some(Channel::new(ChannelId::Summary));
        self.publish(RunUpdate::ChannelStarted(ChannelId::Summary));
        self.set_state(RunState::Streaming);
        self.ctx
            .dispatcher
            .dispatch_summary(request, owner.as_ref(), credential);
    }

    fn open_channel(&mut self, model: &Model) {
        let id = ChannelId::Model(model.clone());
        self.channels.push(Channel::new(id.clone()));
        self.publish(RunUpdate::ChannelStarted(id));
    }

    fn channel_mut(&mut self, id: &ChannelId) -> Option<&mut Channel> {
        match id {
            ChannelId::Summary => self.summary.as_mut(),
            ChannelId::Model(_) => self.channels.iter_mut().find(|c| c.id() == id),
        }
    }

    fn handle_event(&mut self, event: ChannelEvent) {
        let Some(channel) = self.channel_mut(&event.channel) else {
            debug!(channel = %event.channel, "Event for unknown channel dropped");
            return;
        };
        if channel.is_terminal() {
            return;
        }

        match event.kind {
            ChannelEventKind::Delta(text) => {
                if channel.push_delta(text) {
                    debug!(channel = %event.channel, "Channel streaming");
                }
                self.ctx.scheduler.ensure_running();
                if self.state == RunState::Dispatching {
                    self.set_state(RunState::Streaming);
                }
            }
            ChannelEventKind::End(end) => {
                let outcome = channel.terminate(end);
                let snapshot = channel.snapshot();
                self.on_terminal(event.channel, outcome, snapshot);
            }
        }
    }

    fn on_terminal(&mut self, id: ChannelId, outcome: ChannelOutcome, snapshot: ChannelSnapshot) {
        match &outcome {
            ChannelOutcome::Error { kind, message, .. } => {
                warn!(channel = %id, ?kind, %message, "Channel ended with error");
            }
            other => {
                debug!(channel = %id, status = other.status().as_str(), bytes = other.text().len(), "Channel ended");
            }
        }
        self.ctx.logger.log(RunEvent::new(
            "channel_finished",
            json!({
                "run": self.ctx.id,
                "channel": id.as_str(),
                "outcome": &outcome,
            }),
        ));
        self.publish(RunUpdate::Snapshot(snapshot));

        if !self.any_streaming() {
            self.ctx.scheduler.stop();
        }

        if id.is_summary() {
            self.set_state(RunState::Complete);
            return;
        }

        if self.mode == RunMode::SequentialRelay && self.dispatch_next_hop(Some(&outcome)) {
            return;
        }

        if self.channels.iter().all(Channel::is_terminal) {
            self.settle();
        }
    }

    fn settle(&mut self) {
        self.set_state(RunState::Settling);
        let results = self.primary_results();

        match summary::decide(
            &results,
            &self.ctx.language,
            &self.ctx.languages,
            self.ctx.summary_enabled,
        ) {
            SummaryDecision::Dispatch(responses) => {
                info!(run = self.ctx.id, sources = responses.len(), "Requesting summary");
                self.ctx.logger.log(RunEvent::new(
                    "summary_decision",
                    json!({ "run": self.ctx.id, "dispatch": true, "sources": responses.keys().collect::<Vec<_>>() }),
                ));
                self.dispatch_summary(responses);
            }
            SummaryDecision::Skip(reason) => {
                info!(run = self.ctx.id, %reason, "Skipping summary");
                self.ctx.logger.log(RunEvent::new(
                    "summary_decision",
                    json!({ "run": self.ctx.id, "dispatch": false, "reason": reason.to_string() }),
                ));
                self.skip_summary = true;
                self.publish(RunUpdate::SummarySkipped(reason));
                self.set_state(RunState::Complete);
            }
        }
    }

    fn flush_all(&mut self) {
        let mut snapshots = Vec::new();
        for channel in self.channels.iter_mut().chain(self.summary.as_mut()) {
            if channel.flush() {
                snapshots.push(channel.snapshot());
            }
        }
        trace!(run = self.ctx.id, flushed = snapshots.len(), "Flush tick");
        for snapshot in snapshots {
            self.publish(RunUpdate::Snapshot(snapshot));
        }
    }

    fn any_streaming(&self) -> bool {
        self.channels
            .iter()
            .chain(self.summary.as_ref())
            .any(|c| c.state() == ChannelState::Streaming)
    }

    fn set_state(&mut self, next: RunState) {
        if self.state == next {
            return;
        }
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid run transition {} -> {}",
            self.state,
            next
        );
        debug!(run = self.ctx.id, from = %self.state, to = %next, "Run state");
        self.state = next;
        self.publish(RunUpdate::State(next));
    }

    /// Dropped silently once the run was cancelled.
    fn publish(&self, update: RunUpdate) {
        self.ctx.gate.send(update);
    }

    fn primary_results(&self) -> Vec<ChannelResult> {
        self.channels
            .iter()
            .filter_map(|c| {
                c.outcome()
                    .map(|outcome| ChannelResult::new(c.id().clone(), outcome.clone()))
            })
            .collect()
    }

    fn result(&self) -> RunResult {
        RunResult {
            mode: self.mode,
            question: self.ctx.question.content().to_string(),
            language: self.ctx.language.clone(),
            responses: self.primary_results(),
            summary: self.summary.as_ref().and_then(|c| {
                c.outcome()
                    .map(|outcome| ChannelResult::new(ChannelId::Summary, outcome.clone()))
            }),
            skip_summary: self.skip_summary,
            state: self.state,
            discussion: self.discussion.clone(),
        }
    }
}
