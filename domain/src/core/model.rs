//! Model value object identifying one backend

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Identifier of a model backend (Value Object)
///
/// The set of valid identifiers is not fixed here: it comes from the
/// model registry in configuration. A `Model` is just a validated,
/// normalized tag (`"openai"`, `"deepseek"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Model(String);

impl Model {
    /// Create a model id, normalizing surrounding whitespace and case.
    ///
    /// Returns `None` for an empty or whitespace-only tag.
    pub fn try_new(id: impl AsRef<str>) -> Option<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_ascii_lowercase()))
        }
    }

    /// Get the string identifier for this model
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name used in headers and prompts (`"openai"` -> `"OPENAI"`).
    pub fn display_name(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl std::fmt::Display for Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for Model {
    type Err = crate::core::error::DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Model::try_new(s).ok_or_else(|| Self::Err::InvalidModel(s.to_string()))
    }
}

impl AsRef<str> for Model {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for Model {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Model {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
