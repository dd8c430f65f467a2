//! Use cases
//!
//! Application-level operations that orchestrate domain logic.

pub mod dispatch;
pub mod isolate;
pub mod orchestrate;
pub mod summary;
