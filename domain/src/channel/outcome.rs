//! Terminal state of a channel.
//!
//! A channel failure is data: it is recorded here and returned with the
//! aggregate, never raised across channels.

use serde::{Deserialize, Serialize};

/// Compact status carried by snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminalStatus {
    Success,
    Error,
    /// Transport ended without an explicit terminal marker.
    ImplicitCompletion,
}

impl TerminalStatus {
    pub fn as_str(&self) -> &str {
        match self {
            TerminalStatus::Success => "success",
            TerminalStatus::Error => "error",
            TerminalStatus::ImplicitCompletion => "implicit_completion",
        }
    }

    /// Success and implicit completion both count as a usable answer.
    pub fn is_success(&self) -> bool {
        !matches!(self, TerminalStatus::Error)
    }
}

/// Classification of a per-channel failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelErrorKind {
    /// No usable credential for this model
    CredentialMissing,
    /// Timeout, connection drop, or non-2xx status
    NetworkFailure,
    /// The backend sent an explicit error record
    Backend,
    /// The channel task itself died
    Internal,
}

/// Final resolved status of one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Success {
        text: String,
    },
    Error {
        kind: ChannelErrorKind,
        message: String,
        /// Text accumulated before the failure
        partial: String,
    },
    ImplicitCompletion {
        text: String,
    },
}

impl ChannelOutcome {
    pub fn status(&self) -> TerminalStatus {
        match self {
            ChannelOutcome::Success { .. } => TerminalStatus::Success,
            ChannelOutcome::Error { .. } => TerminalStatus::Error,
            ChannelOutcome::ImplicitCompletion { .. } => TerminalStatus::ImplicitCompletion,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status().is_success()
    }

    /// Accumulated text regardless of outcome.
    pub fn text(&self) -> &str {
        match self {
            ChannelOutcome::Success { text } | ChannelOutcome::ImplicitCompletion { text } => text,
            ChannelOutcome::Error { partial, .. } => partial,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ChannelOutcome::Error { message, .. } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_implicit_completion_counts_as_success() {
        let outcome = ChannelOutcome::ImplicitCompletion {
            text: "partial?".to_string(),
        };
        assert!(outcome.is_success());
        assert_eq!(outcome.status(), TerminalStatus::ImplicitCompletion);
        assert_ne!(outcome.status(), TerminalStatus::Success);
    }

    #[test]
    fn test_error_keeps_partial_text() {
        let outcome = ChannelOutcome::Error {
            kind: ChannelErrorKind::NetworkFailure,
            message: "timeout".to_string(),
            partial: "half an ans".to_string(),
        };
        assert!(!outcome.is_success());
        assert_eq!(outcome.text(), "half an ans");
        assert_eq!(outcome.error(), Some("timeout"));
    }

    #[test]
    fn test_outcome_serialization_is_tagged() {
        let outcome = ChannelOutcome::Success {
            text: "4".to_string(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["text"], "4");
    }
}
