//! Aggregate result of one run

use super::mode::RunMode;
use super::relay::DiscussionContext;
use super::state::RunState;
use crate::channel::ChannelId;
use crate::channel::outcome::ChannelOutcome;
use crate::conversation::entities::{ConversationTurn, ModelResponse};
use crate::core::language::Language;
use crate::core::model::Model;
use serde::Serialize;

/// Final state of one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelResult {
    pub channel_id: ChannelId,
    pub outcome: ChannelOutcome,
}

impl ChannelResult {
    pub fn new(channel_id: ChannelId, outcome: ChannelOutcome) -> Self {
        Self {
            channel_id,
            outcome,
        }
    }

    pub fn model(&self) -> Option<&Model> {
        self.channel_id.model()
    }

    pub fn is_success(&self) -> bool {
        self.outcome.is_success()
    }
}

/// Every channel of a run regardless of individual outcome.
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub mode: RunMode,
    pub question: String,
    pub language: Language,
    /// Primary channels in dispatch order
    pub responses: Vec<ChannelResult>,
    pub summary: Option<ChannelResult>,
    pub skip_summary: bool,
    pub state: RunState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discussion: Option<DiscussionContext>,
}

impl RunResult {
    pub fn successful(&self) -> impl Iterator<Item = &ChannelResult> {
        self.responses.iter().filter(|r| r.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successful().count()
    }

    pub fn summary_text(&self) -> Option<&str> {
        self.summary
            .as_ref()
            .filter(|s| s.is_success())
            .map(|s| s.outcome.text())
    }

    /// Per-model responses in the shape the conversation store keeps.
    pub fn model_responses(&self) -> Vec<ModelResponse> {
        self.responses
            .iter()
            .filter_map(|r| {
                let model = r.model()?.clone();
                Some(match &r.outcome {
                    ChannelOutcome::Error {
                        message, partial, ..
                    } => ModelResponse::failure(model, partial.clone(), message.clone()),
                    outcome => ModelResponse::success(model, outcome.text()),
                })
            })
            .collect()
    }

    /// Assistant turn recording this run for later context building.
    pub fn to_assistant_turn(&self) -> ConversationTurn {
        let selected = self
            .responses
            .iter()
            .filter_map(|r| r.model().cloned())
            .collect();
        ConversationTurn::assistant(
            self.model_responses(),
            selected,
            self.summary_text().map(str::to_string),
        )
        .with_language(self.language.clone())
    }
}
