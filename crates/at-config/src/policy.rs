//! Policy for external tool failures.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What to do when Prep or Core exits non-zero or writes nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailurePolicy {
    /// Abort the remaining steps of the weekday.
    #[default]
    Fatal,
    /// Log a warning and keep going; the working profile is only advanced
    /// when Core succeeded.
    Warn,
}

impl fmt::Display for ToolFailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolFailurePolicy::Fatal => write!(f, "fatal"),
            ToolFailurePolicy::Warn => write!(f, "warn"),
        }
    }
}

impl FromStr for ToolFailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fatal" => Ok(ToolFailurePolicy::Fatal),
            "warn" => Ok(ToolFailurePolicy::Warn),
            other => Err(format!(
                "unknown tool failure policy '{other}' (expected fatal or warn)"
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_fatal() {
        assert_eq!(ToolFailurePolicy::default(), ToolFailurePolicy::Fatal);
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!(
            "WARN".parse::<ToolFailurePolicy>(),
            Ok(ToolFailurePolicy::Warn)
        );
        assert!("skip".parse::<ToolFailurePolicy>().is_err());
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&ToolFailurePolicy::Warn).unwrap();
        assert_eq!(json, r#""warn""#);
    }
}
