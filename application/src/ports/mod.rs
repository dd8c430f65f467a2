//! Port definitions (interfaces for external adapters)
//!
//! Ports define the contracts that infrastructure adapters must implement.

pub mod backend_gateway;
pub mod conversation_store;
pub mod credential_store;
pub mod progress;
pub mod run_logger;
