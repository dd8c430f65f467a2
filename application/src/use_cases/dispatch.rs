//! Request Dispatcher
//!
//! Prepares each model's payload (filtered context, relay fields) and runs
//! one isolated backend call per channel. Every call reports back through
//! an [`EventSink`] as a sequence of deltas followed by exactly one end
//! event.

use super::isolate::isolate;
use crate::config::ExecutionParams;
use crate::ports::backend_gateway::{
    BackendGateway, BackendReply, BackendRequest, ChatPayload, Credential, CredentialMap,
    GatewayError,
};
use crate::streaming::{ChannelEnd, SseDecoder};
use crate::use_cases::summary;
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thinking_domain::{
    ChannelErrorKind, ChannelId, ConversationTurn, Language, Model, RelayStep, RunMode,
    StreamEvent, build_model_context,
};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEventKind {
    Delta(String),
    End(ChannelEnd),
}

/// Something that happened on one channel's backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEvent {
    pub channel: ChannelId,
    pub kind: ChannelEventKind,
}

impl ChannelEvent {
    pub fn delta(channel: ChannelId, text: String) -> Self {
        Self {
            channel,
            kind: ChannelEventKind::Delta(text),
        }
    }

    pub fn end(channel: ChannelId, end: ChannelEnd) -> Self {
        Self {
            channel,
            kind: ChannelEventKind::End(end),
        }
    }
}

/// Sending half of a run's channel event queue.
#[derive(Debug, Clone)]
pub struct EventSink(mpsc::UnboundedSender<ChannelEvent>);

impl EventSink {
    pub fn new(tx: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        Self(tx)
    }

    /// Returns `false` once the run stopped listening.
    pub fn send(&self, event: ChannelEvent) -> bool {
        self.0.send(event).is_ok()
    }
}

/// Issues backend calls for one run.
///
/// Dropping the dispatcher aborts every call still in flight.
pub struct RequestDispatcher {
    gateway: Arc<dyn BackendGateway>,
    credentials: Arc<CredentialMap>,
    timeout: Duration,
    deadline: Duration,
    max_context_messages: usize,
    stream: bool,
    sink: EventSink,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
}

impl RequestDispatcher {
    pub fn new(
        gateway: Arc<dyn BackendGateway>,
        credentials: Arc<CredentialMap>,
        params: &ExecutionParams,
        sink: EventSink,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            credentials,
            timeout: params.request_timeout,
            deadline: params.call_deadline,
            max_context_messages: params.max_context_messages,
            stream: params.stream,
            sink,
            cancel,
            tasks: JoinSet::new(),
        }
    }

    pub fn credentials(&self) -> &CredentialMap {
        &self.credentials
    }

    /// Build one model's request: its own filtered context plus, in a relay,
    /// the previous hop's model and answer.
    pub fn chat_request(
        &self,
        model: &Model,
        mode: RunMode,
        prompt: &str,
        history: &[ConversationTurn],
        language: &Language,
        relay: Option<&RelayStep>,
    ) -> BackendRequest {
        let messages = build_model_context(history, model, prompt, self.max_context_messages);
        BackendRequest::Chat {
            model: model.clone(),
            mode,
            payload: ChatPayload {
                messages,
                language: language.clone(),
                stream: self.stream,
                previous_model: relay.and_then(|step| step.previous_model.clone()),
                previous_response: relay.and_then(|step| step.previous_response.clone()),
            },
        }
    }

    pub fn summary_request(
        &self,
        responses: BTreeMap<String, String>,
        question: &str,
        language: &Language,
        credential_owner: Option<&Model>,
    ) -> BackendRequest {
        BackendRequest::Summary {
            payload: summary::payload(responses, question, language, self.stream),
            credential_owner: credential_owner.cloned(),
        }
    }

    /// Start one model's call.
    ///
    /// A model without a usable credential is terminated immediately with a
    /// `CredentialMissing` error; nothing is sent for it. Returns whether a
    /// call was started.
    pub fn dispatch_model(&mut self, model: &Model, request: BackendRequest) -> bool {
        let channel = ChannelId::Model(model.clone());
        let credential = self.credentials.get(model).cloned();
        if credential.is_none() && self.gateway.requires_credential(model) {
            self.reject_missing_credential(channel, model);
            return false;
        }
        self.spawn(channel, request, credential);
        true
    }

    /// Start the summary call, authenticated as `owner`.
    pub fn dispatch_summary(
        &mut self,
        request: BackendRequest,
        owner: Option<&Model>,
        credential: Option<Credential>,
    ) -> bool {
        if credential.is_none() {
            if let Some(owner) = owner.filter(|m| self.gateway.requires_credential(m)) {
                self.reject_missing_credential(ChannelId::Summary, owner);
                return false;
            }
        }
        self.spawn(ChannelId::Summary, request, credential);
        true
    }

    fn reject_missing_credential(&self, channel: ChannelId, model: &Model) {
        warn!(channel = %channel, "No API key for {}", model.display_name());
        self.sink.send(ChannelEvent::end(
            channel,
            ChannelEnd::Failed {
                kind: ChannelErrorKind::CredentialMissing,
                message: GatewayError::CredentialMissing(model.display_name()).to_string(),
            },
        ));
    }

    fn spawn(&mut self, channel: ChannelId, request: BackendRequest, credential: Option<Credential>) {
        debug!(channel = %channel, "Dispatching backend call");
        let gateway = Arc::clone(&self.gateway);
        let sink = self.sink.clone();
        let timeout = self.timeout;
        let deadline = Instant::now() + self.deadline;
        let id = channel.clone();
        let call_sink = sink.clone();

        self.tasks.spawn(isolate(channel, sink, self.cancel.clone(), async move {
            let call =
                stream_call(gateway.as_ref(), &id, request, credential.as_ref(), timeout, &call_sink);
            match tokio::time::timeout_at(deadline, call).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(channel = %id, "Backend call hit its deadline");
                    Err(GatewayError::Timeout)
                }
            }
        }));
    }
}

/// Drive one backend call to its end, forwarding deltas as they decode.
///
/// `timeout` bounds the wait for the reply and every wait for the next body
/// chunk. The caller bounds the call as a whole.
async fn stream_call(
    gateway: &dyn BackendGateway,
    channel: &ChannelId,
    request: BackendRequest,
    credential: Option<&Credential>,
    timeout: Duration,
    sink: &EventSink,
) -> Result<ChannelEnd, GatewayError> {
    let reply = tokio::time::timeout(timeout, gateway.send(request, credential))
        .await
        .map_err(|_| GatewayError::Timeout)??;

    let mut body = match reply {
        BackendReply::Complete(text) => {
            if !text.is_empty() {
                sink.send(ChannelEvent::delta(channel.clone(), text));
            }
            return Ok(ChannelEnd::Done);
        }
        BackendReply::Streaming(body) => body,
    };

    let mut decoder = SseDecoder::new();
    loop {
        let next = tokio::time::timeout(timeout, body.next())
            .await
            .map_err(|_| GatewayError::Timeout)?;

        let Some(chunk) = next else {
            let tail = decoder.finish();
            if decoder.malformed_records() > 0 {
                debug!(
                    channel = %channel,
                    skipped = decoder.malformed_records(),
                    "Stream ended with skipped records"
                );
            }
            return Ok(forward(channel, tail, sink).unwrap_or(ChannelEnd::EndOfStream));
        };

        let events = decoder
            .push(&chunk?)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        if let Some(end) = forward(channel, events, sink) {
            return Ok(end);
        }
    }
}

/// Send deltas on; return the end if the batch contained a terminal event.
fn forward(channel: &ChannelId, events: Vec<StreamEvent>, sink: &EventSink) -> Option<ChannelEnd> {
    for event in events {
        match event {
            StreamEvent::Delta(text) => {
                sink.send(ChannelEvent::delta(channel.clone(), text));
            }
            StreamEvent::Error(message) => {
                return Some(ChannelEnd::Failed {
                    kind: ChannelErrorKind::Backend,
                    message,
                });
            }
            StreamEvent::Done => return Some(ChannelEnd::Done),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedGateway, content, done, keys, model};
    use thinking_domain::{Message, ModelResponse};

    struct Harness {
        dispatcher: RequestDispatcher,
        rx: mpsc::UnboundedReceiver<ChannelEvent>,
    }

    fn harness(gateway: Arc<ScriptedGateway>, credentials: CredentialMap) -> Harness {
        let (tx, rx) = mpsc::unbounded_channel();
        let dispatcher = RequestDispatcher::new(
            gateway,
            Arc::new(credentials),
            &ExecutionParams::default(),
            EventSink::new(tx),
            CancellationToken::new(),
        );
        Harness { dispatcher, rx }
    }

    impl Harness {
        fn chat(&mut self, id: &str) -> bool {
            let m = model(id);
            let request =
                self.dispatcher
                    .chat_request(&m, RunMode::FanOut, "q", &[], &Language::English, None);
            self.dispatcher.dispatch_model(&m, request)
        }

        /// Collect events until the first end event.
        async fn until_end(&mut self) -> Vec<ChannelEvent> {
            let mut events = Vec::new();
            while let Some(event) = self.rx.recv().await {
                let is_end = matches!(event.kind, ChannelEventKind::End(_));
                events.push(event);
                if is_end {
                    break;
                }
            }
            events
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_streams_deltas_then_done() {
        let gateway = Arc::new(ScriptedGateway::new().script(
            "m1",
            Script::sse(&[(10, content("Hel")), (10, content("lo")), (10, done())]),
        ));
        let mut h = harness(Arc::clone(&gateway), keys(&["m1"]));
        assert!(h.chat("m1"));

        let kinds: Vec<_> = h.until_end().await.into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChannelEventKind::Delta("Hel".to_string()),
                ChannelEventKind::Delta("lo".to_string()),
                ChannelEventKind::End(ChannelEnd::Done),
            ]
        );
        assert_eq!(gateway.calls()[0].credential.as_deref(), Some("key-m1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_credential_rejects_only_that_model() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("m1", Script::sse(&[(10, content("4")), (10, done())]))
                .script("m2", Script::sse(&[(10, done())])),
        );
        let mut h = harness(Arc::clone(&gateway), keys(&["m1"]));
        assert!(h.chat("m1"));
        assert!(!h.chat("m2"));

        let first = h.rx.recv().await.unwrap();
        assert_eq!(first.channel, ChannelId::Model(model("m2")));
        assert!(matches!(
            first.kind,
            ChannelEventKind::End(ChannelEnd::Failed {
                kind: ChannelErrorKind::CredentialMissing,
                ..
            })
        ));

        let rest = h.until_end().await;
        assert_eq!(
            rest.last().map(|e| &e.kind),
            Some(&ChannelEventKind::End(ChannelEnd::Done))
        );
        assert_eq!(gateway.calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_open_backend_needs_no_credential() {
        let gateway = Arc::new(
            ScriptedGateway::new()
                .script("local", Script::sse(&[(10, done())]))
                .without_credential("local"),
        );
        let mut h = harness(Arc::clone(&gateway), CredentialMap::new());
        assert!(h.chat("local"));
        let events = h.until_end().await;
        assert_eq!(events[0].kind, ChannelEventKind::End(ChannelEnd::Done));
        assert!(gateway.calls()[0].credential.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_stream_times_out() {
        let gateway = Arc::new(ScriptedGateway::new().script("m1", Script::Hang));
        let mut h = harness(gateway, keys(&["m1"]));
        let start = tokio::time::Instant::now();
        h.chat("m1");

        let events = h.until_end().await;
        assert_eq!(
            events[0].kind,
            ChannelEventKind::End(ChannelEnd::Failed {
                kind: ChannelErrorKind::NetworkFailure,
                message: "Request timed out".to_string(),
            })
        );
        assert_eq!(start.elapsed(), Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_steady_stream_is_cut_at_call_deadline() {
        let chunks: Vec<(u64, String)> = (0..30).map(|_| (21_000, content("."))).collect();
        let gateway = Arc::new(ScriptedGateway::new().script("m1", Script::sse(chunks.as_slice())));
        let mut h = harness(gateway, keys(&["m1"]));
        let start = tokio::time::Instant::now();
        h.chat("m1");

        let events = h.until_end().await;
        assert_eq!(
            events.last().map(|e| &e.kind),
            Some(&ChannelEventKind::End(ChannelEnd::Failed {
                kind: ChannelErrorKind::NetworkFailure,
                message: "Request timed out".to_string(),
            }))
        );
        // Every gap is under the idle timeout, so only the deadline can end it
        assert_eq!(start.elapsed(), Duration::from_secs(300));
        let deltas = events
            .iter()
            .filter(|e| matches!(e.kind, ChannelEventKind::Delta(_)))
            .count();
        assert_eq!(deltas, 14);
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_of_stream_without_marker() {
        let gateway = Arc::new(
            ScriptedGateway::new().script("m1", Script::sse(&[(10, content("cut"))])),
        );
        let mut h = harness(gateway, keys(&["m1"]));
        h.chat("m1");
        let events = h.until_end().await;
        assert_eq!(
            events.last().map(|e| &e.kind),
            Some(&ChannelEventKind::End(ChannelEnd::EndOfStream))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_complete_reply_is_one_delta_and_done() {
        let gateway = Arc::new(
            ScriptedGateway::new().script("m1", Script::Complete("whole answer".to_string())),
        );
        let mut h = harness(gateway, keys(&["m1"]));
        h.chat("m1");
        let kinds: Vec<_> = h.until_end().await.into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                ChannelEventKind::Delta("whole answer".to_string()),
                ChannelEventKind::End(ChannelEnd::Done),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_http_error_is_network_failure() {
        let gateway = Arc::new(ScriptedGateway::new().script(
            "m1",
            Script::Fail(GatewayError::Http {
                status: 401,
                body: "invalid key".to_string(),
            }),
        ));
        let mut h = harness(gateway, keys(&["m1"]));
        h.chat("m1");
        let events = h.until_end().await;
        assert_eq!(
            events[0].kind,
            ChannelEventKind::End(ChannelEnd::Failed {
                kind: ChannelErrorKind::NetworkFailure,
                message: "HTTP 401: invalid key".to_string(),
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_carries_only_own_history() {
        let gateway = Arc::new(ScriptedGateway::new());
        let h = harness(gateway, keys(&["a", "b"]));
        let history = vec![
            ConversationTurn::user("q1"),
            ConversationTurn::assistant(
                vec![
                    ModelResponse::success(model("a"), "from a"),
                    ModelResponse::success(model("b"), "from b"),
                ],
                vec![model("a"), model("b")],
                None,
            ),
        ];

        let request = h.dispatcher.chat_request(
            &model("a"),
            RunMode::FanOut,
            "q2",
            &history,
            &Language::English,
            None,
        );
        let BackendRequest::Chat { payload, .. } = request else {
            panic!("expected chat request");
        };
        assert_eq!(
            payload.messages,
            vec![
                Message::user("q1"),
                Message::assistant("from a"),
                Message::user("q2"),
            ]
        );
        assert!(payload.previous_model.is_none());
    }
}
