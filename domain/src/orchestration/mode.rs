//! Dispatch policy of a run

use serde::{Deserialize, Serialize};

/// How the primary channels of a run are dispatched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Chat mode: every model is queried at once, independently.
    #[default]
    FanOut,
    /// Discuss mode: one model at a time, each seeing the previous answer.
    SequentialRelay,
}

impl RunMode {
    pub fn as_str(&self) -> &str {
        match self {
            RunMode::FanOut => "chat",
            RunMode::SequentialRelay => "discuss",
        }
    }
}

impl std::fmt::Display for RunMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for RunMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "chat" | "fan-out" | "fanout" | "parallel" => Ok(RunMode::FanOut),
            "discuss" | "relay" | "sequential" => Ok(RunMode::SequentialRelay),
            other => Err(format!(
                "unknown mode '{other}' (expected 'chat' or 'discuss')"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mode_aliases() {
        assert_eq!("chat".parse::<RunMode>().unwrap(), RunMode::FanOut);
        assert_eq!(
            "Discuss".parse::<RunMode>().unwrap(),
            RunMode::SequentialRelay
        );
        assert!("vote".parse::<RunMode>().is_err());
    }
}
