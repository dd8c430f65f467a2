//! Conversation Store port
//!
//! The orchestrator reads prior turns as input; the caller writes the
//! finished turn back after a run.

use thinking_domain::ConversationTurn;

/// Opaque source/sink of conversation history
pub trait ConversationStore: Send + Sync {
    /// All turns so far, oldest first.
    fn history(&self) -> Vec<ConversationTurn>;

    fn append(&self, turn: ConversationTurn);

    fn clear(&self);
}
