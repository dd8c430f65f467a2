//! Raw TOML configuration data types
//!
//! These structs represent the exact structure of the TOML config file.
//! They are deserialized directly and converted into application and
//! adapter settings by the methods on [`FileConfig`].

mod backend;
mod languages;
mod models;
mod output;
mod streaming;
mod summary;

pub use backend::FileBackendConfig;
pub use languages::{FileLanguageConfig, FileLanguagesConfig};
pub use models::{FileModelConfig, FileModelsConfig};
pub use output::{FileOutputConfig, FileOutputFormat};
pub use streaming::FileStreamingConfig;
pub use summary::FileSummaryConfig;

use crate::credentials::CredentialSource;
use crate::gateway::{HttpGatewayConfig, ModelEndpoint};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use thinking_application::ExecutionParams;
use thinking_domain::{LanguageModels, Model};
use thiserror::Error;

/// Problems detected in a loaded configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    #[error("backend.timeout_seconds cannot be 0")]
    InvalidTimeout,

    #[error("backend.max_call_seconds cannot be 0")]
    InvalidCallDeadline,

    #[error("streaming.flush_interval_ms cannot be 0")]
    InvalidFlushInterval,

    #[error("streaming.max_context_messages cannot be 0")]
    InvalidContextCap,

    #[error("backend.base_url is not a valid URL: {0}")]
    InvalidBaseUrl(String),

    #[error("{field}: model name cannot be empty")]
    EmptyModelName { field: String },

    #[error("{field}: '{model}' is not in the model registry")]
    UnknownModel { field: String, model: String },

    #[error("languages.{0}: invalid language tag")]
    InvalidLanguage(String),
}

/// Complete file configuration (raw TOML structure)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Backend connection
    pub backend: FileBackendConfig,
    /// Flush tick and context window
    pub streaming: FileStreamingConfig,
    /// Model registry
    pub models: FileModelsConfig,
    /// Language rosters
    pub languages: FileLanguagesConfig,
    /// Summary channel
    pub summary: FileSummaryConfig,
    /// Keys by model id; environment variables take precedence
    pub credentials: BTreeMap<String, String>,
    /// Output settings
    pub output: FileOutputConfig,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            backend: FileBackendConfig::default(),
            streaming: FileStreamingConfig::default(),
            models: models::builtin_models(),
            languages: languages::builtin_languages(),
            summary: FileSummaryConfig::default(),
            credentials: BTreeMap::new(),
            output: FileOutputConfig::default(),
        }
    }
}

impl FileConfig {
    /// Validate the entire configuration, returning all detected issues.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut issues = Vec::new();

        if self.backend.timeout_seconds == 0 {
            issues.push(ConfigValidationError::InvalidTimeout);
        }
        if self.backend.max_call_seconds == 0 {
            issues.push(ConfigValidationError::InvalidCallDeadline);
        }
        if self.streaming.flush_interval_ms == 0 {
            issues.push(ConfigValidationError::InvalidFlushInterval);
        }
        if self.streaming.max_context_messages == 0 {
            issues.push(ConfigValidationError::InvalidContextCap);
        }
        if let Err(e) = url::Url::parse(&self.backend.base_url) {
            issues.push(ConfigValidationError::InvalidBaseUrl(e.to_string()));
        }

        let (registry, registry_issues) = models::parse_registry(&self.models);
        issues.extend(registry_issues);

        // Rosters may only name registered models
        for (tag, entry) in &self.languages {
            let (profile, profile_issues) = entry.to_profile(tag);
            issues.extend(profile_issues);

            let listed = profile
                .models
                .iter()
                .map(|m| (format!("languages.{tag}.models"), m))
                .chain(
                    profile
                        .summary_model
                        .iter()
                        .map(|m| (format!("languages.{tag}.summary_model"), m)),
                );
            for (field, model) in listed {
                if !registry.iter().any(|(known, _)| known == model) {
                    issues.push(ConfigValidationError::UnknownModel {
                        field,
                        model: model.to_string(),
                    });
                }
            }
            if tag.parse::<thinking_domain::Language>().is_err() {
                issues.push(ConfigValidationError::InvalidLanguage(tag.clone()));
            }
        }

        issues
    }

    /// Orchestration parameters from `[backend]`, `[streaming]` and `[summary]`.
    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams::default()
            .with_request_timeout(Duration::from_secs(self.backend.timeout_seconds))
            .with_call_deadline(Duration::from_secs(self.backend.max_call_seconds))
            .with_flush_interval(Duration::from_millis(self.streaming.flush_interval_ms))
            .with_max_context_messages(self.streaming.max_context_messages)
            .with_stream(self.backend.stream)
            .with_summary(self.summary.enabled)
    }

    /// Injected language mapping; invalid entries are skipped.
    pub fn language_models(&self) -> LanguageModels {
        languages::to_language_models(&self.languages).0
    }

    /// Endpoint table for the HTTP gateway.
    pub fn gateway_config(&self) -> HttpGatewayConfig {
        let (registry, _) = models::parse_registry(&self.models);
        let endpoints = registry
            .into_iter()
            .map(|(model, entry)| {
                let id = model.as_str();
                let endpoint = ModelEndpoint {
                    path: entry.path_for(id),
                    discuss_path: entry.discuss_path_for(id),
                    credential_header: entry.credential_header_for(id),
                    requires_credential: entry.requires_credential,
                };
                (model, endpoint)
            })
            .collect();

        HttpGatewayConfig {
            base_url: self.backend.base_url.clone(),
            summary_path: self.summary.path.clone(),
            endpoints,
        }
    }

    /// Where each registered model's key may come from.
    pub fn credential_sources(&self) -> Vec<CredentialSource> {
        let (registry, _) = models::parse_registry(&self.models);
        registry
            .into_iter()
            .map(|(model, entry)| {
                let configured = self
                    .credentials
                    .iter()
                    .find(|(id, _)| Model::try_new(id).as_ref() == Some(&model))
                    .map(|(_, key)| key.clone());
                CredentialSource {
                    env_var: entry.credential_env_for(model.as_str()),
                    model,
                    configured,
                }
            })
            .collect()
    }

    /// Ids of every registered model, sorted.
    pub fn registered_models(&self) -> Vec<Model> {
        models::parse_registry(&self.models)
            .0
            .into_iter()
            .map(|(model, _)| model)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thinking_domain::{Language, OutputFormat};

    #[test]
    fn test_deserialize_full_config() {
        let toml_str = r#"
[backend]
base_url = "http://127.0.0.1:9000"
timeout_seconds = 45
stream = false

[streaming]
flush_interval_ms = 150
max_context_messages = 6

[models.local]
path = "/v1/local"
requires_credential = false

[languages.fr]
models = ["local"]
summary_model = "local"

[summary]
enabled = false

[credentials]
openai = "sk-test"

[output]
format = "summary"
color = false
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.base_url, "http://127.0.0.1:9000");
        assert_eq!(config.backend.timeout_seconds, 45);
        assert!(!config.backend.stream);
        assert_eq!(config.streaming.flush_interval_ms, 150);
        assert_eq!(config.models["local"].path.as_deref(), Some("/v1/local"));
        assert!(!config.models["local"].requires_credential);
        assert_eq!(config.languages["fr"].models, vec!["local".to_string()]);
        assert!(!config.summary.enabled);
        assert_eq!(config.credentials["openai"], "sk-test");
        assert_eq!(config.output.format, Some(OutputFormat::Summary));
        assert!(!config.output.color);
    }

    #[test]
    fn test_deserialize_partial_config() {
        let toml_str = r#"
[backend]
timeout_seconds = 10
"#;

        let config: FileConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.backend.timeout_seconds, 10);
        // Defaults should apply
        assert_eq!(config.backend.base_url, "http://localhost:8000");
        assert_eq!(config.streaming.flush_interval_ms, 300);
        assert!(config.summary.enabled);
        assert_eq!(config.models.len(), 6);
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = FileConfig::default();
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_every_issue() {
        let mut config = FileConfig::default();
        config.backend.timeout_seconds = 0;
        config.backend.max_call_seconds = 0;
        config.backend.base_url = "not a url".to_string();
        config.streaming.flush_interval_ms = 0;
        config.streaming.max_context_messages = 0;
        config.languages.insert(
            "en".to_string(),
            FileLanguageConfig {
                models: vec!["openai".to_string(), "mystery".to_string()],
                summary_model: Some("openai".to_string()),
            },
        );

        let issues = config.validate();
        assert!(issues.contains(&ConfigValidationError::InvalidTimeout));
        assert!(issues.contains(&ConfigValidationError::InvalidCallDeadline));
        assert!(issues.contains(&ConfigValidationError::InvalidFlushInterval));
        assert!(issues.contains(&ConfigValidationError::InvalidContextCap));
        assert!(
            issues
                .iter()
                .any(|i| matches!(i, ConfigValidationError::InvalidBaseUrl(_)))
        );
        assert!(issues.contains(&ConfigValidationError::UnknownModel {
            field: "languages.en.models".to_string(),
            model: "mystery".to_string(),
        }));
        assert_eq!(issues.len(), 6);
    }

    #[test]
    fn test_execution_params_conversion() {
        let mut config = FileConfig::default();
        config.backend.timeout_seconds = 12;
        config.backend.max_call_seconds = 90;
        config.streaming.flush_interval_ms = 100;
        config.summary.enabled = false;

        let params = config.execution_params();
        assert_eq!(params.request_timeout, Duration::from_secs(12));
        assert_eq!(params.call_deadline, Duration::from_secs(90));
        assert_eq!(params.flush_interval, Duration::from_millis(100));
        assert_eq!(params.max_context_messages, 10);
        assert!(params.stream);
        assert!(!params.summary_enabled);
    }

    #[test]
    fn test_gateway_config_resolves_endpoints() {
        let gateway = FileConfig::default().gateway_config();
        let openai = &gateway.endpoints[&Model::try_new("openai").unwrap()];
        assert_eq!(openai.path, "/api/chat/openai");
        assert_eq!(openai.discuss_path, "/api/discuss/openai");
        assert_eq!(openai.credential_header, "X-OpenAI-API-Key");
        assert_eq!(gateway.summary_path, "/api/chat/summary");
    }

    #[test]
    fn test_credential_sources_carry_configured_keys() {
        let mut config = FileConfig::default();
        config
            .credentials
            .insert("DeepSeek".to_string(), "ds-key".to_string());

        let sources = config.credential_sources();
        let deepseek = sources
            .iter()
            .find(|s| s.model.as_str() == "deepseek")
            .unwrap();
        assert_eq!(deepseek.env_var, "DEEPSEEK_API_KEY");
        assert_eq!(deepseek.configured.as_deref(), Some("ds-key"));
    }

    #[test]
    fn test_language_models_conversion() {
        let languages = FileConfig::default().language_models();
        assert_eq!(languages.models_for(&Language::English).len(), 3);
    }
}
