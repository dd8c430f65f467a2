//! Interactive chat module
//!
//! Provides a line-editor based chat interface and the turn runner shared
//! with the one-shot CLI.

mod repl;
pub mod session;

pub use repl::ChatRepl;
pub use session::{ChatSession, TurnError, TurnRequest};
