//! Domain layer for thinking
//!
//! This crate contains the core business types and pure functions.
//! It has no dependencies on infrastructure or presentation concerns.
//!
//! # Core Concepts
//!
//! - **Channel**: the per-model (or summary) unit of streamed response state
//! - **Fan-Out**: every requested model is queried concurrently (chat mode)
//! - **Sequential Relay**: models answer one at a time, each seeing the
//!   previous answer (discuss mode)
//! - **Summary**: an extra channel comparing at least two successful answers

pub mod channel;
pub mod config;
pub mod conversation;
pub mod core;
pub mod orchestration;

// Re-export commonly used types
pub use channel::{
    ChannelId, ChannelSnapshot, ChannelState, SUMMARY_CHANNEL,
    outcome::{ChannelErrorKind, ChannelOutcome, TerminalStatus},
    stream::StreamEvent,
};
pub use config::OutputFormat;
pub use conversation::{
    context::{DEFAULT_MAX_CONTEXT_MESSAGES, build_model_context},
    entities::{ConversationTurn, Message, ModelResponse, Role},
};
pub use core::{
    error::DomainError,
    language::{Language, LanguageModels, LanguageProfile},
    model::Model,
    question::Question,
};
pub use orchestration::{
    mode::RunMode,
    relay::{DiscussionContext, RelayStep},
    result::{ChannelResult, RunResult},
    state::RunState,
};
