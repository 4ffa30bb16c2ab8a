//! The resolved, immutable configuration value.

use crate::policy::ToolFailurePolicy;
use at_common::WeekdaySelector;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

/// Default number of refinement passes.
pub const DEFAULT_RUN_COUNT: u32 = 1;

/// Default per-invocation timeout for external tools.
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 600;

/// Glucose-entries result cap per query.
pub const DEFAULT_ENTRIES_COUNT: u32 = 1500;

/// External programs the harness shells out to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolCommands {
    pub prep: String,
    pub core: String,
    pub report: String,
    pub export: String,
}

impl Default for ToolCommands {
    fn default() -> Self {
        Self {
            prep: "oref0-autotune-prep".to_string(),
            core: "oref0-autotune-core".to_string(),
            report: "oref0-autotune-recommends-report".to_string(),
            export: "oref0-autotune-export-to-xlsx".to_string(),
        }
    }
}

/// Telemetry fetch behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchSettings {
    /// Retries after the first failed attempt; `0` means a single attempt.
    pub retries: u32,
    /// Base backoff, doubled per attempt.
    pub backoff_ms: u64,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
    /// Result cap for glucose entries.
    pub entries_count: u32,
    /// Skip the network for dates whose artifacts already exist.
    pub reuse_existing: bool,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            retries: 2,
            backoff_ms: 500,
            connect_timeout_secs: 10,
            read_timeout_secs: 60,
            entries_count: DEFAULT_ENTRIES_COUNT,
            reuse_existing: false,
        }
    }
}

impl FetchSettings {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

/// Fully resolved configuration for one invocation.
///
/// Built once by [`crate::resolve_config`] and passed by reference to every
/// component; nothing in the harness reads process-wide settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutotuneConfig {
    /// OpenAPS base directory (contains `settings/` and `autotune/`).
    pub base_dir: PathBuf,
    /// Nightscout site URL, without trailing slash.
    pub ns_host: String,
    #[serde(skip_serializing)]
    pub user_token: Option<String>,
    pub start_date: NaiveDate,
    /// Exclusive end of the date range.
    pub end_date: NaiveDate,
    pub run_count: u32,
    pub weekdays: BTreeSet<WeekdaySelector>,
    pub export_xlsx: Option<String>,
    /// Tee logs to a timestamped file in the working directory.
    pub terminal_log: bool,
    /// Run the recommendations report at the end.
    pub report: bool,
    /// Weekday chains processed concurrently.
    pub jobs: usize,
    pub tool_timeout_secs: u64,
    pub on_tool_failure: ToolFailurePolicy,
    pub tools: ToolCommands,
    pub fetch: FetchSettings,
}

impl AutotuneConfig {
    /// Working directory holding every artifact.
    pub fn autotune_dir(&self) -> PathBuf {
        self.base_dir.join("autotune")
    }

    /// Directory holding the operator's pump settings.
    pub fn settings_dir(&self) -> PathBuf {
        self.base_dir.join("settings")
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }
}
