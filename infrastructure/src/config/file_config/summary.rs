//! Summary settings (`[summary]` section)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileSummaryConfig {
    /// Allow a summary channel after a run
    pub enabled: bool,
    /// Endpoint path of the summary call
    pub path: String,
}

impl Default for FileSummaryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/api/chat/summary".to_string(),
        }
    }
}
