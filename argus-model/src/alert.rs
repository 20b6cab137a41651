//! Alert levels produced by threshold evaluation over participant state.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    None,
    Warning,
    Critical,
}

impl AlertLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertLevel::None => "none",
            AlertLevel::Warning => "warning",
            AlertLevel::Critical => "critical",
        }
    }
}

impl FromStr for AlertLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(AlertLevel::None),
            "warning" => Ok(AlertLevel::Warning),
            "critical" => Ok(AlertLevel::Critical),
            other => Err(ModelError::UnknownAlertLevel(other.to_string())),
        }
    }
}

impl std::fmt::Display for AlertLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of evaluating the alert thresholds against an updated
/// participant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvaluation {
    pub level: AlertLevel,
    pub reasons: Vec<String>,
    pub score: f64,
}

impl AlertEvaluation {
    pub fn none(score: f64) -> Self {
        Self {
            level: AlertLevel::None,
            reasons: Vec::new(),
            score,
        }
    }

    pub fn should_alert(&self) -> bool {
        self.level != AlertLevel::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_escalates() {
        assert!(AlertLevel::Critical > AlertLevel::Warning);
        assert!(AlertLevel::Warning > AlertLevel::None);
    }

    #[test]
    fn none_level_never_alerts() {
        assert!(!AlertEvaluation::none(0.3).should_alert());
    }
}
