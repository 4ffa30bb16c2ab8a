//! Retry planning for telemetry fetches.

use super::source::SourceError;
use at_config::FetchSettings;
use serde::Serialize;

/// Upper bound on a single backoff delay.
const MAX_BACKOFF_MS: u64 = 30_000;

/// Failure classification for retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transient,
    Permanent,
}

/// Retry decision returned by the planner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryDecision {
    pub kind: FailureKind,
    pub delay_ms: Option<u64>,
    pub attempts_left: u32,
}

/// Bounded exponential backoff.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &FetchSettings) -> Self {
        Self {
            max_retries: settings.retries,
            base_backoff_ms: settings.backoff_ms,
        }
    }
}

/// Decide whether to retry after `attempt` failed attempts (0-based).
pub fn plan_retry(error: &SourceError, attempt: u32, policy: &RetryPolicy) -> RetryDecision {
    if !error.is_transient() || attempt >= policy.max_retries {
        return RetryDecision {
            kind: FailureKind::Permanent,
            delay_ms: None,
            attempts_left: 0,
        };
    }
    let factor = 2_u64.saturating_pow(attempt);
    let delay = policy
        .base_backoff_ms
        .saturating_mul(factor)
        .min(MAX_BACKOFF_MS);
    RetryDecision {
        kind: FailureKind::Transient,
        delay_ms: Some(delay),
        attempts_left: policy.max_retries - attempt,
    }
}
