//! Language rosters from TOML (`[languages.<tag>]` tables)
//!
//! # Example
//!
//! ```toml
//! [languages.zh]
//! models = ["qwen", "deepseek", "doubao", "glm"]
//! summary_model = "qwen"
//! ```

use super::ConfigValidationError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thinking_domain::{Language, LanguageModels, LanguageProfile, Model};

/// Rosters keyed by language tag
pub type FileLanguagesConfig = BTreeMap<String, FileLanguageConfig>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileLanguageConfig {
    /// Models queried when a run names none, in relay order
    pub models: Vec<String>,
    /// Model whose key authenticates the summary call
    pub summary_model: Option<String>,
}

impl FileLanguageConfig {
    /// Parse the roster, collecting issues for empty names.
    pub fn to_profile(&self, tag: &str) -> (LanguageProfile, Vec<ConfigValidationError>) {
        let mut issues = Vec::new();
        let field = format!("languages.{tag}.models");

        let models = self
            .models
            .iter()
            .filter_map(|id| {
                let model = Model::try_new(id);
                if model.is_none() {
                    issues.push(ConfigValidationError::EmptyModelName {
                        field: field.clone(),
                    });
                }
                model
            })
            .collect();

        let summary_model = match self.summary_model.as_deref() {
            None => None,
            Some(id) => {
                let model = Model::try_new(id);
                if model.is_none() {
                    issues.push(ConfigValidationError::EmptyModelName {
                        field: format!("languages.{tag}.summary_model"),
                    });
                }
                model
            }
        };

        (
            LanguageProfile {
                models,
                summary_model,
            },
            issues,
        )
    }
}

/// Rosters shipped by default: `en` and `zh`.
pub fn builtin_languages() -> FileLanguagesConfig {
    let roster = |models: &[&str], summary: &str| FileLanguageConfig {
        models: models.iter().map(|m| m.to_string()).collect(),
        summary_model: Some(summary.to_string()),
    };

    BTreeMap::from([
        (
            "en".to_string(),
            roster(&["openai", "grok", "deepseek"], "openai"),
        ),
        (
            "zh".to_string(),
            roster(&["qwen", "deepseek", "doubao", "glm"], "qwen"),
        ),
    ])
}

/// Build the injected language mapping; unparsable entries are skipped.
pub fn to_language_models(
    languages: &FileLanguagesConfig,
) -> (LanguageModels, Vec<ConfigValidationError>) {
    let mut issues = Vec::new();
    let mut mapping = LanguageModels::new();

    for (tag, entry) in languages {
        let language: Language = match tag.parse() {
            Ok(language) => language,
            Err(_) => {
                issues.push(ConfigValidationError::InvalidLanguage(tag.clone()));
                continue;
            }
        };
        let (profile, profile_issues) = entry.to_profile(tag);
        issues.extend(profile_issues);
        mapping = mapping.with_profile(language, profile);
    }

    (mapping, issues)
}
