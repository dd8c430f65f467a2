//! Conversation domain.
//!
//! - [`entities::ConversationTurn`] — one user or assistant turn in the history
//! - [`entities::Message`] — a `{role, content}` pair sent to a backend
//! - [`context::build_model_context`] — per-model context reconstruction

pub mod context;
pub mod entities;
