//! Backend Gateway port
//!
//! Defines the interface for calling the per-model and summary backend
//! endpoints. The gateway only moves bytes; decoding into [`StreamEvent`]s
//! happens in [`crate::streaming::decoder`].
//!
//! [`StreamEvent`]: thinking_domain::StreamEvent

use async_trait::async_trait;
use futures::Stream;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::pin::Pin;
use thinking_domain::{Language, Message, Model, RunMode};
use thiserror::Error;

/// Errors that can occur during backend gateway operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Missing credential for {0}")]
    CredentialMissing(String),

    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Other error: {0}")]
    Other(String),
}

/// Raw response body chunks, in transport order.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, GatewayError>> + Send>>;

/// What a backend call returned.
pub enum BackendReply {
    /// SSE body, still being received
    Streaming(ByteStream),
    /// Non-streaming body: the complete `content` text
    Complete(String),
}

impl std::fmt::Debug for BackendReply {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendReply::Streaming(_) => f.write_str("BackendReply::Streaming(..)"),
            BackendReply::Complete(text) => f.debug_tuple("BackendReply::Complete").field(text).finish(),
        }
    }
}

/// Body of a per-model request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatPayload {
    pub messages: Vec<Message>,
    pub language: Language,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_model: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response: Option<String>,
}

/// Body of a summary request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SummaryPayload {
    /// `{model → final text}`, ordered for stable payloads
    pub responses: BTreeMap<String, String>,
    pub question: String,
    pub language: Language,
    pub stream: bool,
}

/// One outgoing backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendRequest {
    Chat {
        model: Model,
        /// Selects the chat or discuss endpoint
        mode: RunMode,
        payload: ChatPayload,
    },
    Summary {
        payload: SummaryPayload,
        /// Model whose credential authenticates the call
        credential_owner: Option<Model>,
    },
}

impl BackendRequest {
    /// Label used in logs
    pub fn label(&self) -> &str {
        match self {
            BackendRequest::Chat { model, .. } => model.as_str(),
            BackendRequest::Summary { .. } => thinking_domain::SUMMARY_CHANNEL,
        }
    }
}

/// An API key for one backend.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Returns `None` for blank keys.
    pub fn new(key: impl Into<String>) -> Option<Self> {
        let key = key.into();
        let trimmed = key.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(***)")
    }
}

/// Read-only `{model → key}` map used for one dispatch.
#[derive(Debug, Clone, Default)]
pub struct CredentialMap {
    keys: HashMap<Model, Credential>,
}

impl CredentialMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, model: Model, credential: Credential) -> Self {
        self.keys.insert(model, credential);
        self
    }

    pub fn insert(&mut self, model: Model, credential: Credential) {
        self.keys.insert(model, credential);
    }

    pub fn get(&self, model: &Model) -> Option<&Credential> {
        self.keys.get(model)
    }

    pub fn contains(&self, model: &Model) -> bool {
        self.keys.contains_key(model)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Gateway to the model and summary backends
///
/// Implementations (adapters) live in the infrastructure layer.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Issue one backend call.
    ///
    /// Resolves once response headers are in; the body is consumed through
    /// the returned [`BackendReply`].
    async fn send(
        &self,
        request: BackendRequest,
        credential: Option<&Credential>,
    ) -> Result<BackendReply, GatewayError>;

    /// Whether calls for this model must carry a credential.
    fn requires_credential(&self, _model: &Model) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> Model {
        id.parse().unwrap()
    }

    #[test]
    fn test_chat_payload_omits_absent_relay_fields() {
        let payload = ChatPayload {
            messages: vec![Message::user("hi")],
            language: Language::English,
            stream: true,
            previous_model: None,
            previous_response: None,
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["language"], "en");
        assert_eq!(json["messages"][0]["role"], "user");
        assert!(json.get("previous_model").is_none());
        assert!(json.get("previous_response").is_none());
    }

    #[test]
    fn test_chat_payload_carries_relay_fields() {
        let payload = ChatPayload {
            messages: vec![],
            language: Language::Chinese,
            stream: false,
            previous_model: Some(model("m1")),
            previous_response: Some("X".to_string()),
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["previous_model"], "m1");
        assert_eq!(json["previous_response"], "X");
        assert_eq!(json["stream"], false);
    }

    #[test]
    fn test_credential_is_redacted_and_trimmed() {
        let credential = Credential::new("  sk-secret ").unwrap();
        assert_eq!(credential.expose(), "sk-secret");
        assert_eq!(format!("{:?}", credential), "Credential(***)");
        assert!(Credential::new("   ").is_none());
    }

    #[test]
    fn test_credential_map_lookup() {
        let map = CredentialMap::new().with(model("m1"), Credential::new("k").unwrap());
        assert!(map.contains(&model("m1")));
        assert!(map.get(&model("m2")).is_none());
        assert_eq!(map.len(), 1);
    }
}
