//! Streaming settings (`[streaming]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileStreamingConfig {
    /// Period of the shared flush tick
    pub flush_interval_ms: u64,
    /// Messages kept in each model's context
    pub max_context_messages: usize,
}

impl Default for FileStreamingConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 300,
            max_context_messages: 10,
        }
    }
}
