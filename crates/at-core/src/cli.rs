//! Command-line interface.

use crate::logging::LogFormat;
use at_config::{CliOverrides, ToolFailurePolicy};
use chrono::NaiveDate;
use clap::builder::BoolishValueParser;
use clap::Parser;
use std::path::PathBuf;

/// Run Autotune separately for each day of the week.
///
/// Dates in [start, end) are grouped by weekday (1 = Monday .. 7 = Sunday)
/// and each group is tuned on its own, producing one profile per weekday
/// in <dir>/autotune/profile.tuned.<dow>.json.
#[derive(Debug, Parser)]
#[command(name = "autotune-dow", version, about, long_about)]
pub struct Cli {
    /// OpenAPS base directory (holds settings/ and autotune/)
    #[arg(short = 'd', long)]
    pub dir: PathBuf,

    /// Nightscout site URL
    #[arg(short = 'n', long, env = "NIGHTSCOUT_HOST")]
    pub ns_host: Option<String>,

    /// First date to tune (YYYY-MM-DD)
    #[arg(short = 's', long)]
    pub start_date: NaiveDate,

    /// Nightscout API token
    #[arg(short = 'u', long, env = "NIGHTSCOUT_TOKEN", hide_env_values = true)]
    pub user_token: Option<String>,

    /// Day after the last date to tune (YYYY-MM-DD, default today)
    #[arg(short = 'e', long)]
    pub end_date: Option<NaiveDate>,

    /// Refinement passes over each weekday's dates
    #[arg(short = 'r', long)]
    pub runs: Option<u32>,

    /// Export results to this spreadsheet file
    #[arg(short = 'x', long, value_name = "FILE")]
    pub xlsx: Option<String>,

    /// Also write logs to autotune/autotune.<timestamp>.log
    #[arg(short = 'l', long, value_name = "BOOL", value_parser = BoolishValueParser::new())]
    pub log: Option<bool>,

    /// Comma-separated weekdays, 1 = Monday .. 7 = Sunday
    #[arg(short = 'w', long, value_name = "LIST")]
    pub days_of_week: Option<String>,

    /// Config file (default <dir>/autotune-dow.toml)
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Weekdays processed concurrently
    #[arg(long)]
    pub jobs: Option<usize>,

    /// Retries per telemetry request (0 = single attempt)
    #[arg(long)]
    pub fetch_retries: Option<u32>,

    /// Time budget for each external tool call
    #[arg(long, value_name = "SECS")]
    pub tool_timeout_secs: Option<u64>,

    /// What a failed Prep/Core call does to its weekday: fatal or warn
    #[arg(long, value_name = "POLICY")]
    pub on_tool_failure: Option<ToolFailurePolicy>,

    /// Reuse telemetry files already on disk instead of refetching
    #[arg(long)]
    pub reuse_telemetry: bool,

    /// Skip the recommendations report
    #[arg(long)]
    pub no_report: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    pub fn to_overrides(&self) -> CliOverrides {
        CliOverrides {
            dir: self.dir.clone(),
            ns_host: self.ns_host.clone(),
            start_date: Some(self.start_date),
            user_token: self.user_token.clone(),
            end_date: self.end_date,
            runs: self.runs,
            xlsx: self.xlsx.clone(),
            log: self.log,
            days_of_week: self.days_of_week.clone(),
            config: self.config.clone(),
            jobs: self.jobs,
            fetch_retries: self.fetch_retries,
            tool_timeout_secs: self.tool_timeout_secs,
            on_tool_failure: self.on_tool_failure,
            reuse_telemetry: self.reuse_telemetry,
            no_report: self.no_report,
        }
    }
}
