//! Sequential Relay dependency chain

use crate::channel::outcome::ChannelOutcome;
use crate::core::model::Model;
use serde::Serialize;

/// One hop of a relay: the model to query and what it is told about the
/// hop before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelayStep {
    pub model: Model,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_model: Option<Model>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_response: Option<String>,
}

impl RelayStep {
    pub fn first(model: Model) -> Self {
        Self {
            model,
            previous_model: None,
            previous_response: None,
        }
    }

    /// Hop following `previous`. An errored predecessor passes no text, so
    /// the relay continues in degraded form.
    pub fn after(model: Model, previous: &Model, outcome: &ChannelOutcome) -> Self {
        let previous_response = outcome.is_success().then(|| outcome.text().to_string());
        Self {
            model,
            previous_model: Some(previous.clone()),
            previous_response,
        }
    }
}

/// Ordered relay chain, grown one hop at a time as channels terminate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiscussionContext {
    steps: Vec<RelayStep>,
}

impl DiscussionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the next hop from the last dispatched one and record it.
    pub fn advance(&mut self, model: Model, last_outcome: Option<&ChannelOutcome>) -> &RelayStep {
        let step = match (self.steps.last(), last_outcome) {
            (Some(prev), Some(outcome)) => RelayStep::after(model, &prev.model, outcome),
            _ => RelayStep::first(model),
        };
        self.steps.push(step);
        &self.steps[self.steps.len() - 1]
    }

    pub fn steps(&self) -> &[RelayStep] {
        &self.steps
    }
}
