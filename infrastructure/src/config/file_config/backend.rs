//! Backend connection settings (`[backend]` section)

use serde::{Deserialize, Serialize};

/// Raw backend configuration from TOML
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileBackendConfig {
    /// Scheme, host and port of the aggregation backend
    pub base_url: String,
    /// Bound on waiting for headers and on each gap between body chunks
    pub timeout_seconds: u64,
    /// Bound on one call from dispatch to its last chunk
    pub max_call_seconds: u64,
    /// Request SSE bodies instead of one JSON reply
    pub stream: bool,
}

impl Default for FileBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout_seconds: 30,
            max_call_seconds: 300,
            stream: true,
        }
    }
}
