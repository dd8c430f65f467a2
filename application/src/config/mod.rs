//! Application-level configuration.
//!
//! - [`ExecutionParams`] — flush interval, per-call timeout, context cap and
//!   summary switch for the orchestrator

pub mod execution_params;

pub use execution_params::ExecutionParams;
