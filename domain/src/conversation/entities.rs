//! Conversation entities exchanged with the conversation store and backends

use crate::core::language::Language;
use crate::core::model::Model;
use serde::{Deserialize, Serialize};

/// Speaker of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// A single message in a backend request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Accumulated text of one channel at a point in time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: Model,
    pub content: String,
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelResponse {
    pub fn success(model: Model, content: impl Into<String>) -> Self {
        Self {
            model,
            content: content.into(),
            done: true,
            error: None,
        }
    }

    pub fn failure(model: Model, content: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            model,
            content: content.into(),
            done: true,
            error: Some(error.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// One turn of the conversation history.
///
/// Assistant turns carry every model's answer in `model_responses`; a turn's
/// `content` is only what the user saw as the headline (usually the summary).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_responses: Option<Vec<ModelResponse>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_models: Option<Vec<Model>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Language the run used, so later turns can reuse it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<Language>,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            model_responses: None,
            selected_models: None,
            summary: None,
            language: None,
        }
    }

    /// Assistant turn holding the per-model answers of one run.
    pub fn assistant(
        responses: Vec<ModelResponse>,
        selected_models: Vec<Model>,
        summary: Option<String>,
    ) -> Self {
        Self {
            role: Role::Assistant,
            content: summary.clone().unwrap_or_default(),
            model_responses: Some(responses),
            selected_models: Some(selected_models),
            summary,
            language: None,
        }
    }

    pub fn with_language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// This model's own successful answer in an assistant turn, if any.
    pub fn response_of(&self, model: &Model) -> Option<&str> {
        if self.role != Role::Assistant {
            return None;
        }
        self.model_responses
            .as_ref()?
            .iter()
            .find(|r| &r.model == model && r.is_success() && !r.content.is_empty())
            .map(|r| r.content.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model(id: &str) -> Model {
        id.parse().unwrap()
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let msg = Message::assistant("hi");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "assistant");
        assert_eq!(json["content"], "hi");
    }

    #[test]
    fn test_model_response_error_skipped_when_none() {
        let json = serde_json::to_value(ModelResponse::success(model("m1"), "4")).unwrap();
        assert!(json.get("error").is_none());
        assert_eq!(json["done"], true);
    }

    #[test]
    fn test_response_of_ignores_failures_and_other_models() {
        let turn = ConversationTurn::assistant(
            vec![
                ModelResponse::success(model("a"), "from a"),
                ModelResponse::failure(model("b"), "", "timeout"),
            ],
            vec![model("a"), model("b")],
            None,
        );

        assert_eq!(turn.response_of(&model("a")), Some("from a"));
        assert_eq!(turn.response_of(&model("b")), None);
        assert_eq!(turn.response_of(&model("c")), None);
        assert_eq!(ConversationTurn::user("q").response_of(&model("a")), None);
    }

    #[test]
    fn test_turn_uses_camel_case_fields() {
        let turn = ConversationTurn::assistant(
            vec![ModelResponse::success(model("a"), "x")],
            vec![model("a")],
            Some("sum".to_string()),
        );
        let json = serde_json::to_value(&turn).unwrap();
        assert!(json.get("modelResponses").is_some());
        assert!(json.get("selectedModels").is_some());
        assert_eq!(json["summary"], "sum");
        assert!(json.get("language").is_none());

        let json = serde_json::to_value(turn.with_language(Language::Chinese)).unwrap();
        assert_eq!(json["language"], "zh");
    }
}
