//! Mode Controller
//!
//! Public entry points for a run: parallel fan-out (chat mode), sequential
//! relay (discuss mode), a standalone summary request, and cancellation of
//! whatever is active.
//!
//! Each run gets its own coordinator task, cancellation token and update
//! gate. Starting a run cancels the previous one first, so channels of an
//! abandoned prompt can never publish into the next one.

mod coordinator;
mod handle;

pub use handle::{RunHandle, RunUpdate};

use crate::config::ExecutionParams;
use crate::ports::backend_gateway::{BackendGateway, CredentialMap};
use crate::ports::run_logger::{NoRunLogger, RunEvent, RunLogger};
use crate::streaming::FlushScheduler;
use crate::use_cases::dispatch::{EventSink, RequestDispatcher};
use coordinator::{RunContext, RunCoordinator, RunPlan};
use handle::UpdateGate;
use serde_json::json;
use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thinking_domain::{ConversationTurn, Language, LanguageModels, Model, Question, RunMode};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// The only error a run entry point returns; per-channel failures are data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestrationError {
    #[error("Dispatch failed: {0}")]
    DispatchFailure(String),
}

/// Input for a fan-out (chat mode) run
#[derive(Debug, Clone)]
pub struct FanOutInput {
    pub question: Question,
    /// Prior turns; each model only sees its own answers
    pub history: Vec<ConversationTurn>,
    /// Empty means "the language's default models"
    pub models: Vec<Model>,
    pub credentials: CredentialMap,
    pub language: Language,
}

impl FanOutInput {
    pub fn new(question: Question, models: Vec<Model>) -> Self {
        Self {
            question,
            history: Vec::new(),
            models,
            credentials: CredentialMap::new(),
            language: Language::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialMap) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// Input for a sequential relay (discuss mode) run
#[derive(Debug, Clone)]
pub struct RelayInput {
    pub question: Question,
    /// Empty means "the language's default models"
    pub model_order: Vec<Model>,
    pub credentials: CredentialMap,
    pub language: Language,
    pub history: Vec<ConversationTurn>,
}

impl RelayInput {
    pub fn new(question: Question, model_order: Vec<Model>) -> Self {
        Self {
            question,
            model_order,
            credentials: CredentialMap::new(),
            language: Language::default(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_credentials(mut self, credentials: CredentialMap) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }
}

/// Input for a standalone summary request
#[derive(Debug, Clone)]
pub struct SummaryInput {
    pub question: Question,
    /// `{model → final text}` to compare
    pub responses: BTreeMap<Model, String>,
    pub credentials: CredentialMap,
    pub language: Language,
    /// Mode of the run whose answers are summarised
    pub mode: RunMode,
}

impl SummaryInput {
    pub fn new(question: Question, responses: BTreeMap<Model, String>) -> Self {
        Self {
            question,
            responses,
            credentials: CredentialMap::new(),
            language: Language::default(),
            mode: RunMode::FanOut,
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialMap) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = language;
        self
    }

    pub fn with_mode(mut self, mode: RunMode) -> Self {
        self.mode = mode;
        self
    }
}

struct ActiveRun {
    id: u64,
    cancel: CancellationToken,
    gate: UpdateGate,
}

/// Slot holding the currently active run, shared with its coordinator so
/// a finished run can clear itself.
#[derive(Clone, Default)]
pub(crate) struct RunSlot {
    inner: Arc<Mutex<Option<ActiveRun>>>,
}

impl RunSlot {
    fn lock(&self) -> MutexGuard<'_, Option<ActiveRun>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn install(&self, run: ActiveRun) {
        *self.lock() = Some(run);
    }

    fn take(&self) -> Option<ActiveRun> {
        self.lock().take()
    }

    /// Clear the slot if it still holds run `id`.
    pub(crate) fn release(&self, id: u64) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|run| run.id == id) {
            *guard = None;
        }
    }
}

/// Runs prompts against several backends and aggregates their answers.
///
/// Entry points spawn onto the current Tokio runtime.
pub struct Orchestrator {
    gateway: Arc<dyn BackendGateway>,
    languages: Arc<LanguageModels>,
    params: ExecutionParams,
    logger: Arc<dyn RunLogger>,
    active: RunSlot,
    next_run: AtomicU64,
}

impl Orchestrator {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        languages: LanguageModels,
        params: ExecutionParams,
    ) -> Self {
        Self {
            gateway,
            languages: Arc::new(languages),
            params,
            logger: Arc::new(NoRunLogger),
            active: RunSlot::default(),
            next_run: AtomicU64::new(1),
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn RunLogger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    pub fn languages(&self) -> &LanguageModels {
        &self.languages
    }

    /// Query every model concurrently.
    pub fn run_fan_out(&self, input: FanOutInput) -> Result<RunHandle, OrchestrationError> {
        let models = self.resolve_models(input.models, &input.language)?;
        Ok(self.start(
            RunPlan::FanOut {
                models,
                history: input.history,
            },
            input.question,
            input.language,
            input.credentials,
        ))
    }

    /// Query models one at a time, each seeing the previous answer.
    pub fn run_sequential_relay(&self, input: RelayInput) -> Result<RunHandle, OrchestrationError> {
        let order = self.resolve_models(input.model_order, &input.language)?;
        Ok(self.start(
            RunPlan::Relay {
                order,
                history: input.history,
            },
            input.question,
            input.language,
            input.credentials,
        ))
    }

    /// Ask for a summary of answers gathered elsewhere.
    ///
    /// Unlike the summary step of a run, no minimum count applies here; an
    /// empty response map is a dispatch failure.
    pub fn request_summary(&self, input: SummaryInput) -> Result<RunHandle, OrchestrationError> {
        if input.responses.is_empty() {
            return Err(self.dispatch_failure("no responses to summarise"));
        }
        let responses = input
            .responses
            .into_iter()
            .map(|(model, text)| (model.to_string(), text))
            .collect();
        Ok(self.start(
            RunPlan::Summary {
                mode: input.mode,
                responses,
            },
            input.question,
            input.language,
            input.credentials,
        ))
    }

    /// Tear down the active run, if any.
    ///
    /// Once this returns, the run's handle yields nothing more. Calling it
    /// again (or with nothing running) is a no-op. Returns whether a run was
    /// cancelled.
    pub fn cancel_active(&self) -> bool {
        let Some(run) = self.active.take() else {
            return false;
        };
        run.cancel.cancel();
        run.gate.close();
        info!(run = run.id, "Cancelled active run");
        true
    }

    fn resolve_models(
        &self,
        requested: Vec<Model>,
        language: &Language,
    ) -> Result<Vec<Model>, OrchestrationError> {
        let candidates = if requested.is_empty() {
            self.languages.models_for(language).to_vec()
        } else {
            requested
        };

        // One channel per model
        let mut seen = HashSet::new();
        let models: Vec<Model> = candidates
            .into_iter()
            .filter(|m| seen.insert(m.clone()))
            .collect();

        if models.is_empty() {
            return Err(self.dispatch_failure(&format!(
                "no models to query for language '{language}'"
            )));
        }
        Ok(models)
    }

    fn dispatch_failure(&self, reason: &str) -> OrchestrationError {
        warn!(%reason, "Run failed before dispatch");
        self.logger.log(RunEvent::new(
            "run_failed",
            json!({ "state": "failed", "reason": reason }),
        ));
        OrchestrationError::DispatchFailure(reason.to_string())
    }

    fn start(
        &self,
        plan: RunPlan,
        question: Question,
        language: Language,
        credentials: CredentialMap,
    ) -> RunHandle {
        self.cancel_active();

        let id = self.next_run.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let gate = UpdateGate::new(update_tx);
        let (event_tx, events) = mpsc::unbounded_channel();

        let dispatcher = RequestDispatcher::new(
            Arc::clone(&self.gateway),
            Arc::new(credentials),
            &self.params,
            EventSink::new(event_tx),
            cancel.clone(),
        );

        self.active.install(ActiveRun {
            id,
            cancel: cancel.clone(),
            gate: gate.clone(),
        });

        let ctx = RunContext {
            id,
            question,
            language,
            languages: Arc::clone(&self.languages),
            summary_enabled: self.params.summary_enabled,
            dispatcher,
            events,
            gate,
            cancel: cancel.clone(),
            logger: Arc::clone(&self.logger),
            scheduler: FlushScheduler::new(self.params.flush_interval),
            slot: self.active.clone(),
        };
        debug!(run = id, "Spawning run coordinator");
        tokio::spawn(RunCoordinator::new(ctx, plan).run());

        RunHandle::new(update_rx, cancel)
    }
}
