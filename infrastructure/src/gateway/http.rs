//! HTTP implementation of [`BackendGateway`] using `reqwest`.
//!
//! Every model has its own chat and discuss endpoint; the key travels in a
//! model-specific header, percent-encoded because the backend URL-decodes
//! it. Streaming bodies are handed back as raw byte chunks.

use async_trait::async_trait;
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use thinking_application::{
    BackendGateway, BackendReply, BackendRequest, Credential, GatewayError,
};
use thinking_domain::{Model, RunMode};
use tracing::debug;

/// Cap on the error body excerpt kept from a non-2xx reply
pub const MAX_ERROR_BODY_BYTES: usize = 4 * 1024;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Where one model is reached and how it is authenticated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelEndpoint {
    pub path: String,
    pub discuss_path: String,
    pub credential_header: String,
    pub requires_credential: bool,
}

/// Endpoint table of the aggregation backend.
#[derive(Debug, Clone, Default)]
pub struct HttpGatewayConfig {
    pub base_url: String,
    pub summary_path: String,
    pub endpoints: HashMap<Model, ModelEndpoint>,
}

/// Gateway posting JSON payloads to the backend over HTTP.
pub struct HttpBackendGateway {
    client: reqwest::Client,
    config: HttpGatewayConfig,
}

impl HttpBackendGateway {
    pub fn new(config: HttpGatewayConfig) -> Result<Self, GatewayError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| GatewayError::Other(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, model: &Model) -> Result<&ModelEndpoint, GatewayError> {
        self.config
            .endpoints
            .get(model)
            .ok_or_else(|| GatewayError::Other(format!("Unknown model: {model}")))
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn build(
        &self,
        request: &BackendRequest,
        credential: Option<&Credential>,
    ) -> Result<(reqwest::RequestBuilder, bool), GatewayError> {
        let (path, owner, body, stream) = match request {
            BackendRequest::Chat {
                model,
                mode,
                payload,
            } => {
                let endpoint = self.endpoint(model)?;
                let path = match mode {
                    RunMode::FanOut => &endpoint.path,
                    RunMode::SequentialRelay => &endpoint.discuss_path,
                };
                let body = serde_json::to_value(payload)
                    .map_err(|e| GatewayError::Other(e.to_string()))?;
                (path.as_str(), Some(model), body, payload.stream)
            }
            BackendRequest::Summary {
                payload,
                credential_owner,
            } => {
                let body = serde_json::to_value(payload)
                    .map_err(|e| GatewayError::Other(e.to_string()))?;
                (
                    self.config.summary_path.as_str(),
                    credential_owner.as_ref(),
                    body,
                    payload.stream,
                )
            }
        };

        let mut builder = self.client.post(self.url(path)).json(&body);
        if let (Some(credential), Some(owner)) = (credential, owner) {
            let header = match self.config.endpoints.get(owner) {
                Some(endpoint) => endpoint.credential_header.clone(),
                None => format!("X-{}-API-Key", owner.display_name()),
            };
            builder = builder.header(header, encode_credential(credential));
        }
        if stream {
            builder = builder.header(reqwest::header::ACCEPT, "text/event-stream");
        }
        Ok((builder, stream))
    }
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn send(
        &self,
        request: BackendRequest,
        credential: Option<&Credential>,
    ) -> Result<BackendReply, GatewayError> {
        let (builder, stream) = self.build(&request, credential)?;
        debug!(call = request.label(), stream, "POST backend");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            let body = read_capped_error_body(response).await;
            return Err(GatewayError::Http {
                status: status.as_u16(),
                body,
            });
        }

        if stream {
            let body = response
                .bytes_stream()
                .map(|chunk| chunk.map(|b| b.to_vec()).map_err(map_reqwest_error));
            return Ok(BackendReply::Streaming(Box::pin(body)));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        parse_complete_body(&value).map(BackendReply::Complete)
    }

    fn requires_credential(&self, model: &Model) -> bool {
        self.config
            .endpoints
            .get(model)
            .is_none_or(|endpoint| endpoint.requires_credential)
    }
}

/// Percent-encode a key for transport in a header.
fn encode_credential(credential: &Credential) -> String {
    url::form_urlencoded::byte_serialize(credential.expose().as_bytes()).collect()
}

fn map_reqwest_error(e: reqwest::Error) -> GatewayError {
    if e.is_timeout() {
        GatewayError::Timeout
    } else if e.is_connect() || e.is_request() || e.is_body() {
        GatewayError::Connection(e.to_string())
    } else if e.is_decode() {
        GatewayError::InvalidResponse(e.to_string())
    } else {
        GatewayError::Other(e.to_string())
    }
}

/// Text of a non-streaming reply: `{"content": "..."}`.
fn parse_complete_body(value: &serde_json::Value) -> Result<String, GatewayError> {
    if let Some(message) = value.get("error").and_then(|e| e.as_str()) {
        return Err(GatewayError::Other(message.to_string()));
    }
    if value.get("error").and_then(|e| e.as_bool()) == Some(true) {
        let message = value
            .get("content")
            .and_then(|c| c.as_str())
            .unwrap_or("backend reported an error");
        return Err(GatewayError::Other(message.to_string()));
    }
    value
        .get("content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| GatewayError::InvalidResponse("missing 'content' field".to_string()))
}

async fn read_capped_error_body(response: reqwest::Response) -> String {
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
