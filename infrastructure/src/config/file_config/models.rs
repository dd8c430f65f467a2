//! Model registry from TOML (`[models.<id>]` tables)
//!
//! Every model the CLI may address is declared here together with the
//! endpoint paths and the header that carries its credential.
//!
//! # Example
//!
//! ```toml
//! [models.openai]
//! credential_header = "X-OpenAI-API-Key"
//!
//! [models.local]
//! path = "/api/chat/local"
//! requires_credential = false
//! ```

use super::ConfigValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thinking_domain::Model;

/// Registry keyed by model id
pub type FileModelsConfig = BTreeMap<String, FileModelConfig>;

/// Models the backend ships with, and the header names it reads.
const BUILTIN_MODELS: &[(&str, &str)] = &[
    ("openai", "X-OpenAI-API-Key"),
    ("grok", "X-Grok-API-Key"),
    ("qwen", "X-Qwen-API-Key"),
    ("deepseek", "X-DeepSeek-API-Key"),
    ("doubao", "X-Doubao-API-Key"),
    ("glm", "X-GLM-API-Key"),
];

/// One registry entry; unset fields derive from the model id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileModelConfig {
    /// Chat endpoint (default `/api/chat/<id>`)
    pub path: Option<String>,
    /// Discuss endpoint (default `/api/discuss/<id>`)
    pub discuss_path: Option<String>,
    /// Header carrying the key (default `X-<Id>-API-Key`)
    pub credential_header: Option<String>,
    /// Environment variable holding the key (default `<ID>_API_KEY`)
    pub credential_env: Option<String>,
    /// Refuse to dispatch without a key
    pub requires_credential: bool,
}

impl Default for FileModelConfig {
    fn default() -> Self {
        Self {
            path: None,
            discuss_path: None,
            credential_header: None,
            credential_env: None,
            requires_credential: true,
        }
    }
}

impl FileModelConfig {
    pub fn path_for(&self, id: &str) -> String {
        self.path.clone().unwrap_or_else(|| format!("/api/chat/{id}"))
    }

    pub fn discuss_path_for(&self, id: &str) -> String {
        self.discuss_path
            .clone()
            .unwrap_or_else(|| format!("/api/discuss/{id}"))
    }

    pub fn credential_header_for(&self, id: &str) -> String {
        self.credential_header
            .clone()
            .unwrap_or_else(|| format!("X-{}-API-Key", capitalize(id)))
    }

    pub fn credential_env_for(&self, id: &str) -> String {
        self.credential_env
            .clone()
            .unwrap_or_else(|| format!("{}_API_KEY", id.to_ascii_uppercase().replace('-', "_")))
    }
}

fn capitalize(id: &str) -> String {
    let mut chars = id.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Registry entries for the built-in backends.
pub fn builtin_models() -> FileModelsConfig {
    BUILTIN_MODELS
        .iter()
        .map(|(id, header)| {
            (
                id.to_string(),
                FileModelConfig {
                    credential_header: Some(header.to_string()),
                    ..FileModelConfig::default()
                },
            )
        })
        .collect()
}

/// Parse registry keys into model ids, collecting issues for empty names.
pub fn parse_registry(
    models: &FileModelsConfig,
) -> (Vec<(Model, &FileModelConfig)>, Vec<ConfigValidationError>) {
    let mut parsed = Vec::new();
    let mut issues = Vec::new();
    for (id, entry) in models {
        match Model::try_new(id) {
            Some(model) => parsed.push((model, entry)),
            None => issues.push(ConfigValidationError::EmptyModelName {
                field: "models".to_string(),
            }),
        }
    }
    (parsed, issues)
}
