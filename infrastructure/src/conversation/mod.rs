//! In-process conversation history.

use std::sync::{Mutex, PoisonError};
use thinking_application::ConversationStore;
use thinking_domain::ConversationTurn;

/// Keeps turns for the life of the process; nothing is persisted.
#[derive(Default)]
pub struct InMemoryConversationStore {
    turns: Mutex<Vec<ConversationTurn>>,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ConversationStore for InMemoryConversationStore {
    fn history(&self) -> Vec<ConversationTurn> {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn append(&self, turn: ConversationTurn) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(turn);
    }

    fn clear(&self) {
        self.turns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
