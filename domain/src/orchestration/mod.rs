//! Orchestration domain: modes, run states and the aggregate result.
//!
//! - [`mode::RunMode`] — Parallel Fan-Out or Sequential Relay
//! - [`state::RunState`] — the controller's state machine
//! - [`relay::DiscussionContext`] — dependency chain of a relay
//! - [`result::RunResult`] — every channel's outcome plus the summary decision

pub mod mode;
pub mod relay;
pub mod result;
pub mod state;
