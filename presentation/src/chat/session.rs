//! One question-and-answer turn against the orchestrator.
//!
//! Shared by the one-shot CLI and the REPL: resolves the language, starts
//! the run in the chosen mode, drives it to completion (Ctrl-C cancels the
//! active run) and records the finished turn in the conversation store.

use std::collections::BTreeMap;
use std::sync::Arc;
use thinking_application::{
    ConversationStore, CredentialStore, FanOutInput, OrchestrationError, Orchestrator,
    ProgressNotifier, RelayInput, RunHandle, SummaryInput,
};
use thinking_domain::{
    ConversationTurn, DomainError, Language, Model, Question, Role, RunMode, RunResult,
};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TurnError {
    #[error(transparent)]
    InvalidQuestion(#[from] DomainError),

    #[error(transparent)]
    Orchestration(#[from] OrchestrationError),

    #[error("Nothing to summarize yet")]
    NothingToSummarize,
}

/// What the user asked for in one turn.
#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub question: String,
    /// Empty means the language's roster
    pub models: Vec<Model>,
    pub mode: RunMode,
    /// Detected from the question when `None`
    pub language: Option<Language>,
}

impl TurnRequest {
    pub fn new(question: impl Into<String>, models: Vec<Model>, mode: RunMode) -> Self {
        Self {
            question: question.into(),
            models,
            mode,
            language: None,
        }
    }

    pub fn with_language(mut self, language: Option<Language>) -> Self {
        self.language = language;
        self
    }

    pub fn resolved_language(&self) -> Language {
        self.language
            .clone()
            .unwrap_or_else(|| Language::detect(&self.question))
    }
}

/// Orchestrator plus the stores a conversation needs.
pub struct ChatSession {
    orchestrator: Arc<Orchestrator>,
    store: Arc<dyn ConversationStore>,
    credentials: Arc<dyn CredentialStore>,
}

impl ChatSession {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        store: Arc<dyn ConversationStore>,
        credentials: Arc<dyn CredentialStore>,
    ) -> Self {
        Self {
            orchestrator,
            store,
            credentials,
        }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn store(&self) -> &dyn ConversationStore {
        self.store.as_ref()
    }

    /// Start the run for `request` without waiting for it.
    pub fn start(&self, request: &TurnRequest) -> Result<RunHandle, TurnError> {
        let question = Question::new(request.question.clone())?;
        let language = request.resolved_language();
        let history = self.store.history();
        let credentials = self.credentials.credentials();

        let handle = match request.mode {
            RunMode::FanOut => self.orchestrator.run_fan_out(
                FanOutInput::new(question, request.models.clone())
                    .with_history(history)
                    .with_credentials(credentials)
                    .with_language(language),
            )?,
            RunMode::SequentialRelay => self.orchestrator.run_sequential_relay(
                RelayInput::new(question, request.models.clone())
                    .with_history(history)
                    .with_credentials(credentials)
                    .with_language(language),
            )?,
        };
        Ok(handle)
    }

    /// Run one turn to completion and record it.
    ///
    /// Returns `Ok(None)` when the run was cancelled; nothing is recorded then.
    pub async fn ask(
        &self,
        request: &TurnRequest,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<RunResult>, TurnError> {
        let handle = self.start(request)?;
        let result = self.drive(handle, progress).await;
        if let Some(result) = &result {
            self.record(&request.question, result);
        }
        Ok(result)
    }

    /// Ask for a fresh summary of the last recorded turn.
    pub async fn resummarize(
        &self,
        progress: &dyn ProgressNotifier,
    ) -> Result<Option<RunResult>, TurnError> {
        let history = self.store.history();
        let exchange = last_exchange(&history).ok_or(TurnError::NothingToSummarize)?;

        let language = exchange
            .language
            .unwrap_or_else(|| Language::detect(&exchange.question));
        let input = SummaryInput::new(Question::new(exchange.question)?, exchange.responses)
            .with_credentials(self.credentials.credentials())
            .with_language(language);
        let handle = self.orchestrator.request_summary(input)?;
        Ok(self.drive(handle, progress).await)
    }

    async fn drive(&self, handle: RunHandle, progress: &dyn ProgressNotifier) -> Option<RunResult> {
        tokio::select! {
            result = handle.drive(progress) => result,
            _ = tokio::signal::ctrl_c() => {
                if self.orchestrator.cancel_active() {
                    info!("Run cancelled");
                }
                None
            }
        }
    }

    fn record(&self, question: &str, result: &RunResult) {
        self.store.append(ConversationTurn::user(question));
        self.store.append(result.to_assistant_turn());
    }
}

/// The most recent recorded exchange.
struct LastExchange {
    question: String,
    /// Successful answers only
    responses: BTreeMap<Model, String>,
    /// `None` for turns recorded without one
    language: Option<Language>,
}

fn last_exchange(history: &[ConversationTurn]) -> Option<LastExchange> {
    let index = history.iter().rposition(|t| t.role == Role::Assistant)?;
    let answer = &history[index];
    let question = history[..index]
        .iter()
        .rev()
        .find(|t| t.role == Role::User)?
        .content
        .clone();

    let responses: BTreeMap<Model, String> = answer
        .model_responses
        .as_ref()?
        .iter()
        .filter(|r| r.is_success() && !r.content.is_empty())
        .map(|r| (r.model.clone(), r.content.clone()))
        .collect();

    (!responses.is_empty()).then(|| LastExchange {
        question,
        responses,
        language: answer.language.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use thinking_application::{
        BackendGateway, BackendReply, BackendRequest, Credential, CredentialMap, ExecutionParams,
        GatewayError, NoProgress, StaticCredentials,
    };
    use thinking_domain::{LanguageModels, ModelResponse};

    fn model(id: &str) -> Model {
        Model::try_new(id).unwrap()
    }

    /// Answers every call with one SSE record naming the target.
    struct EchoGateway {
        calls: Mutex<Vec<BackendRequest>>,
    }

    #[async_trait]
    impl BackendGateway for EchoGateway {
        async fn send(
            &self,
            request: BackendRequest,
            _credential: Option<&Credential>,
        ) -> Result<BackendReply, GatewayError> {
            let body = format!(
                "data: {}\n\ndata: {{\"content\": \"\", \"done\": true}}\n\n",
                serde_json::json!({ "content": format!("from {}", request.label()) })
            );
            self.calls.lock().unwrap().push(request);
            let stream = futures::stream::iter(vec![Ok::<_, GatewayError>(body.into_bytes())]);
            Ok(BackendReply::Streaming(Box::pin(stream)))
        }
    }

    #[derive(Default)]
    struct VecStore(Mutex<Vec<ConversationTurn>>);

    impl ConversationStore for VecStore {
        fn history(&self) -> Vec<ConversationTurn> {
            self.0.lock().unwrap().clone()
        }
        fn append(&self, turn: ConversationTurn) {
            self.0.lock().unwrap().push(turn);
        }
        fn clear(&self) {
            self.0.lock().unwrap().clear();
        }
    }

    fn session() -> (ChatSession, Arc<EchoGateway>, Arc<VecStore>) {
        let gateway = Arc::new(EchoGateway {
            calls: Mutex::new(Vec::new()),
        });
        let store = Arc::new(VecStore::default());
        let keys = CredentialMap::new()
            .with(model("a"), Credential::new("ka").unwrap())
            .with(model("b"), Credential::new("kb").unwrap());
        let orchestrator = Orchestrator::new(
            gateway.clone(),
            LanguageModels::new(),
            ExecutionParams::default(),
        );
        let session = ChatSession::new(
            Arc::new(orchestrator),
            store.clone(),
            Arc::new(StaticCredentials(keys)),
        );
        (session, gateway, store)
    }

    #[tokio::test(start_paused = true)]
    async fn test_ask_records_user_and_assistant_turns() {
        let (session, _gateway, store) = session();
        let request = TurnRequest::new("hello", vec![model("a"), model("b")], RunMode::FanOut);

        let result = session.ask(&request, &NoProgress).await.unwrap().unwrap();
        assert_eq!(result.success_count(), 2);
        assert_eq!(result.summary_text(), Some("from summary"));

        let history = store.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].content, "hello");
        assert_eq!(history[1].response_of(&model("b")), Some("from b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_resummarize_uses_last_exchange() {
        let (session, gateway, _store) = session();
        let request = TurnRequest::new("hello", vec![model("a"), model("b")], RunMode::FanOut);
        session.ask(&request, &NoProgress).await.unwrap();

        let result = session.resummarize(&NoProgress).await.unwrap().unwrap();
        assert_eq!(result.summary_text(), Some("from summary"));

        let summaries = gateway
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.label() == "summary")
            .count();
        assert_eq!(summaries, 2);
    }

    #[tokio::test]
    async fn test_resummarize_without_history() {
        let (session, _gateway, _store) = session();
        assert!(matches!(
            session.resummarize(&NoProgress).await,
            Err(TurnError::NothingToSummarize)
        ));
    }

    #[test]
    fn test_blank_question_is_rejected() {
        let (session, _gateway, _store) = session();
        let request = TurnRequest::new("   ", vec![model("a")], RunMode::FanOut);
        assert!(matches!(
            session.start(&request),
            Err(TurnError::InvalidQuestion(_))
        ));
    }

    #[test]
    fn test_last_exchange_skips_failures() {
        let history = vec![
            ConversationTurn::user("q1"),
            ConversationTurn::assistant(
                vec![
                    ModelResponse::success(model("a"), "x"),
                    ModelResponse::failure(model("b"), "", "boom"),
                ],
                vec![model("a"), model("b")],
                None,
            ),
        ];
        let exchange = last_exchange(&history).unwrap();
        assert_eq!(exchange.question, "q1");
        assert_eq!(exchange.responses.len(), 1);
        assert_eq!(exchange.responses[&model("a")], "x");
        assert_eq!(exchange.language, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_resummarize_keeps_turn_language() {
        let (session, gateway, store) = session();
        let request = TurnRequest::new("这是什么问题", vec![model("a"), model("b")], RunMode::FanOut)
            .with_language(Some(Language::English));
        session.ask(&request, &NoProgress).await.unwrap();
        assert_eq!(store.history()[1].language, Some(Language::English));

        session.resummarize(&NoProgress).await.unwrap().unwrap();

        let languages: Vec<Language> = gateway
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                BackendRequest::Summary { payload, .. } => Some(payload.language.clone()),
                _ => None,
            })
            .collect();
        assert_eq!(languages, vec![Language::English, Language::English]);
    }

    #[test]
    fn test_language_detection_fallback() {
        let request = TurnRequest::new("这是什么问题", vec![], RunMode::FanOut);
        assert_eq!(request.resolved_language(), Language::Chinese);
        let pinned = request.with_language(Some(Language::English));
        assert_eq!(pinned.resolved_language(), Language::English);
    }
}
