//! Channel domain: the per-model unit of streamed response state.
//!
//! - [`ChannelId`] — a model id or the summary channel
//! - [`stream::StreamEvent`] — decoded backend stream events
//! - [`outcome::ChannelOutcome`] — terminal state of a channel
//! - [`ChannelSnapshot`] — coalesced view delivered to the presentation layer

pub mod outcome;
pub mod stream;

use crate::core::model::Model;
use outcome::TerminalStatus;
use serde::{Serialize, Serializer};

/// Identifier of the summary channel.
pub const SUMMARY_CHANNEL: &str = "summary";

/// Identity of a channel within one run
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChannelId {
    Model(Model),
    Summary,
}

impl ChannelId {
    pub fn as_str(&self) -> &str {
        match self {
            ChannelId::Model(model) => model.as_str(),
            ChannelId::Summary => SUMMARY_CHANNEL,
        }
    }

    pub fn model(&self) -> Option<&Model> {
        match self {
            ChannelId::Model(model) => Some(model),
            ChannelId::Summary => None,
        }
    }

    pub fn is_summary(&self) -> bool {
        matches!(self, ChannelId::Summary)
    }
}

impl From<Model> for ChannelId {
    fn from(model: Model) -> Self {
        ChannelId::Model(model)
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for ChannelId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

/// Lifecycle of a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// Dispatched, nothing received yet
    Pending,
    /// At least one delta received
    Streaming,
    /// Resolved; no further text will arrive
    Terminal,
}

/// Coalesced view of one channel handed to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSnapshot {
    pub channel_id: ChannelId,
    pub text: String,
    pub streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub terminal: Option<TerminalStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChannelSnapshot {
    pub fn is_terminal(&self) -> bool {
        self.terminal.is_some()
    }
}
