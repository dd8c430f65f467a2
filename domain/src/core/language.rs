//! Language tag and the language → model roster mapping

use crate::core::error::DomainError;
use crate::core::model::Model;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;

/// Share of CJK ideographs above which text is treated as Chinese.
const CJK_RATIO_THRESHOLD: f64 = 0.1;

/// Language tag sent to every backend (Value Object)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Language {
    #[default]
    English,
    Chinese,
    Other(String),
}

impl Language {
    pub fn as_str(&self) -> &str {
        match self {
            Language::English => "en",
            Language::Chinese => "zh",
            Language::Other(tag) => tag,
        }
    }

    /// Guess the language of a prompt.
    ///
    /// Returns [`Language::Chinese`] when more than 10% of the characters are
    /// CJK unified ideographs, [`Language::English`] otherwise.
    pub fn detect(text: &str) -> Self {
        let total = text.chars().count().max(1);
        let cjk = text
            .chars()
            .filter(|c| ('\u{4e00}'..='\u{9fff}').contains(c))
            .count();

        if cjk as f64 / total as f64 > CJK_RATIO_THRESHOLD {
            Language::Chinese
        } else {
            Language::English
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        match tag.as_str() {
            "" => Err(DomainError::InvalidLanguage(s.to_string())),
            "en" | "english" => Ok(Language::English),
            "zh" | "chinese" => Ok(Language::Chinese),
            _ => Ok(Language::Other(tag)),
        }
    }
}

impl Serialize for Language {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Language {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Models offered for one language, plus the model that writes the summary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LanguageProfile {
    pub models: Vec<Model>,
    pub summary_model: Option<Model>,
}

/// Injected `{language → ordered model list}` mapping.
///
/// Keeps orchestration independent of any particular roster: callers look
/// up the default models and the summary subset here instead of hardcoding
/// tables.
#[derive(Debug, Clone, Default)]
pub struct LanguageModels {
    profiles: HashMap<Language, LanguageProfile>,
}

impl LanguageModels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, language: Language, profile: LanguageProfile) -> Self {
        self.profiles.insert(language, profile);
        self
    }

    pub fn profile(&self, language: &Language) -> Option<&LanguageProfile> {
        self.profiles.get(language)
    }

    /// Ordered model list for a language (empty when the language is unmapped).
    pub fn models_for(&self, language: &Language) -> &[Model] {
        self.profiles
            .get(language)
            .map(|p| p.models.as_slice())
            .unwrap_or(&[])
    }

    pub fn summary_model_for(&self, language: &Language) -> Option<&Model> {
        self.profiles
            .get(language)
            .and_then(|p| p.summary_model.as_ref())
    }

    /// Whether `model` belongs to the language's subset.
    ///
    /// An unmapped language places no restriction.
    pub fn allows(&self, language: &Language, model: &Model) -> bool {
        match self.profiles.get(language) {
            Some(profile) if !profile.models.is_empty() => profile.models.contains(model),
            _ => true,
        }
    }
}
