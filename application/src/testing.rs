//! Scripted backend used by the orchestration tests.
//!
//! Each model (or `summary`) gets a [`Script`]; SSE scripts emit raw byte
//! chunks after per-chunk delays so tests can run under a paused clock.

use crate::ports::backend_gateway::{
    BackendGateway, BackendReply, BackendRequest, Credential, CredentialMap, GatewayError,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use thinking_domain::Model;
use tokio::time::Instant;

#[derive(Debug, Clone)]
pub(crate) enum Script {
    /// `(delay before chunk in ms, raw chunk)`
    Sse(Vec<(u64, String)>),
    Complete(String),
    Fail(GatewayError),
    /// Headers arrive, body never does
    Hang,
    Panic,
}

impl Script {
    pub(crate) fn sse<S: AsRef<str>>(chunks: &[(u64, S)]) -> Self {
        Script::Sse(
            chunks
                .iter()
                .map(|(delay, chunk)| (*delay, chunk.as_ref().to_string()))
                .collect(),
        )
    }
}

pub(crate) fn content(text: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "content": text }))
}

pub(crate) fn done() -> String {
    "data: {\"content\": \"\", \"done\": true}\n\n".to_string()
}

pub(crate) fn error(message: &str) -> String {
    format!("data: {}\n\n", serde_json::json!({ "error": message }))
}

pub(crate) fn model(id: &str) -> Model {
    id.parse().unwrap()
}

/// Credentials `key-<id>` for each listed model.
pub(crate) fn keys(ids: &[&str]) -> CredentialMap {
    ids.iter().fold(CredentialMap::new(), |map, id| {
        map.with(model(id), Credential::new(format!("key-{id}")).unwrap())
    })
}

#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub request: BackendRequest,
    pub credential: Option<String>,
    pub at: Instant,
}

#[derive(Default)]
pub(crate) struct ScriptedGateway {
    scripts: HashMap<String, Script>,
    open: HashSet<String>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn script(mut self, label: &str, script: Script) -> Self {
        self.scripts.insert(label.to_string(), script);
        self
    }

    pub(crate) fn without_credential(mut self, label: &str) -> Self {
        self.open.insert(label.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_for(&self, label: &str) -> Option<RecordedCall> {
        self.calls()
            .into_iter()
            .find(|call| call.request.label() == label)
    }
}

#[async_trait]
impl BackendGateway for ScriptedGateway {
    async fn send(
        &self,
        request: BackendRequest,
        credential: Option<&Credential>,
    ) -> Result<BackendReply, GatewayError> {
        let label = request.label().to_string();
        self.calls.lock().unwrap().push(RecordedCall {
            request,
            credential: credential.map(|c| c.expose().to_string()),
            at: Instant::now(),
        });

        let script = self
            .scripts
            .get(&label)
            .cloned()
            .unwrap_or_else(|| Script::Fail(GatewayError::Other(format!("no script for {label}"))));

        match script {
            Script::Sse(chunks) => {
                let body = futures::stream::unfold(chunks.into_iter(), |mut chunks| async move {
                    let (delay, chunk) = chunks.next()?;
                    tokio::time::sleep(Duration::from_millis(delay)).await;
                    Some((Ok::<_, GatewayError>(chunk.into_bytes()), chunks))
                });
                Ok(BackendReply::Streaming(Box::pin(body)))
            }
            Script::Complete(text) => Ok(BackendReply::Complete(text)),
            Script::Fail(error) => Err(error),
            Script::Hang => Ok(BackendReply::Streaming(Box::pin(futures::stream::pending::<
                Result<Vec<u8>, GatewayError>,
            >()))),
            Script::Panic => panic!("scripted backend panic"),
        }
    }

    fn requires_credential(&self, model: &Model) -> bool {
        !self.open.contains(model.as_str())
    }
}
