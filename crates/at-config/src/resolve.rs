//! Configuration resolution: CLI → env → config file → defaults.
//!
//! Environment variables are folded in by the CLI layer (clap `env`), so by
//! the time values reach [`CliOverrides`] they already carry that precedence.

use crate::file::{load_file_config, FileConfig};
use crate::settings::{AutotuneConfig, DEFAULT_RUN_COUNT, DEFAULT_TOOL_TIMEOUT_SECS};
use crate::validate::validate;
use crate::{ConfigError, CONFIG_FILE_NAME};
use at_common::WeekdaySelector;
use chrono::NaiveDate;
use std::io;
use std::path::{Path, PathBuf};

/// Default weekday list: every day, Monday first.
pub const DEFAULT_DAYS_OF_WEEK: &str = "1,2,3,4,5,6,7";

/// Values supplied on the command line (or its environment fallbacks).
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub dir: PathBuf,
    pub ns_host: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub user_token: Option<String>,
    pub end_date: Option<NaiveDate>,
    pub runs: Option<u32>,
    pub xlsx: Option<String>,
    pub log: Option<bool>,
    pub days_of_week: Option<String>,
    pub config: Option<PathBuf>,
    pub jobs: Option<usize>,
    pub fetch_retries: Option<u32>,
    pub tool_timeout_secs: Option<u64>,
    pub on_tool_failure: Option<crate::ToolFailurePolicy>,
    pub reuse_telemetry: bool,
    pub no_report: bool,
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    let Some(raw) = path.to_str() else {
        return path.to_path_buf();
    };
    if raw == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    if let Some(rest) = raw.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    path.to_path_buf()
}

/// Resolve configuration, loading the config file from `--config` or from
/// `<dir>/autotune-dow.toml` when present.
pub fn resolve_config(cli: &CliOverrides, today: NaiveDate) -> Result<AutotuneConfig, ConfigError> {
    let base_dir = expand_home(&cli.dir);
    let file_path = match &cli.config {
        Some(path) => {
            let path = expand_home(path);
            if !path.exists() {
                return Err(ConfigError::Io {
                    path: path.clone(),
                    source: io::Error::new(io::ErrorKind::NotFound, "config file not found"),
                });
            }
            path
        }
        None => base_dir.join(CONFIG_FILE_NAME),
    };
    let file = load_file_config(&file_path)?;
    resolve_with_file(cli, file, today)
}

/// Merge CLI values over a loaded file config, then validate.
pub fn resolve_with_file(
    cli: &CliOverrides,
    file: FileConfig,
    today: NaiveDate,
) -> Result<AutotuneConfig, ConfigError> {
    let ns_host = cli
        .ns_host
        .clone()
        .or(file.ns_host)
        .ok_or(ConfigError::Missing("ns_host"))?;
    let start_date = cli.start_date.ok_or(ConfigError::Missing("start_date"))?;
    let days = cli
        .days_of_week
        .clone()
        .or(file.days_of_week)
        .unwrap_or_else(|| DEFAULT_DAYS_OF_WEEK.to_string());
    let weekdays = WeekdaySelector::parse_list(&days)?;

    let mut fetch = file.fetch.unwrap_or_default();
    if let Some(retries) = cli.fetch_retries {
        fetch.retries = retries;
    }
    if cli.reuse_telemetry {
        fetch.reuse_existing = true;
    }

    let user_token = cli
        .user_token
        .clone()
        .or(file.user_token)
        .filter(|t| !t.trim().is_empty());

    let config = AutotuneConfig {
        base_dir: expand_home(&cli.dir),
        ns_host: ns_host.trim().trim_end_matches('/').to_string(),
        user_token,
        start_date,
        end_date: cli.end_date.unwrap_or(today),
        run_count: cli.runs.or(file.runs).unwrap_or(DEFAULT_RUN_COUNT),
        weekdays,
        export_xlsx: cli.xlsx.clone().or(file.xlsx),
        terminal_log: cli.log.or(file.log).unwrap_or(true),
        report: !cli.no_report && file.report.unwrap_or(true),
        jobs: cli.jobs.or(file.jobs).unwrap_or(1),
        tool_timeout_secs: cli
            .tool_timeout_secs
            .or(file.tool_timeout_secs)
            .unwrap_or(DEFAULT_TOOL_TIMEOUT_SECS),
        on_tool_failure: cli
            .on_tool_failure
            .or(file.on_tool_failure)
            .unwrap_or_default(),
        tools: file.tools.unwrap_or_default(),
        fetch,
    };
    validate(&config)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolFailurePolicy;
    use tempfile::tempdir;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn today() -> NaiveDate {
        day("2023-02-01")
    }

    fn base_cli() -> CliOverrides {
        CliOverrides {
            dir: PathBuf::from("/tmp/openaps"),
            ns_host: Some("https://ns.example.org/".to_string()),
            start_date: Some(day("2023-01-02")),
            ..Default::default()
        }
    }

    #[test]
    fn defaults_fill_unset_values() {
        let cfg = resolve_with_file(&base_cli(), FileConfig::default(), today()).unwrap();
        assert_eq!(cfg.ns_host, "https://ns.example.org");
        assert_eq!(cfg.end_date, today());
        assert_eq!(cfg.run_count, 1);
        assert_eq!(cfg.weekdays.len(), 7);
        assert!(cfg.terminal_log);
        assert!(cfg.report);
        assert_eq!(cfg.jobs, 1);
        assert_eq!(cfg.on_tool_failure, ToolFailurePolicy::Fatal);
        assert!(cfg.user_token.is_none());
    }

    #[test]
    fn cli_wins_over_file() {
        let mut cli = base_cli();
        cli.runs = Some(4);
        cli.fetch_retries = Some(0);
        let file = FileConfig {
            runs: Some(2),
            days_of_week: Some("1,3".to_string()),
            on_tool_failure: Some(ToolFailurePolicy::Warn),
            ..Default::default()
        };
        let cfg = resolve_with_file(&cli, file, today()).unwrap();
        assert_eq!(cfg.run_count, 4);
        assert_eq!(cfg.weekdays.len(), 2);
        assert_eq!(cfg.on_tool_failure, ToolFailurePolicy::Warn);
        assert_eq!(cfg.fetch.retries, 0);
    }

    #[test]
    fn missing_host_is_reported() {
        let mut cli = base_cli();
        cli.ns_host = None;
        let err = resolve_with_file(&cli, FileConfig::default(), today()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("ns_host")));
    }

    #[test]
    fn sunday_zero_convention_is_rejected() {
        let mut cli = base_cli();
        cli.days_of_week = Some("0,1,2".to_string());
        let err = resolve_with_file(&cli, FileConfig::default(), today()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Input(at_common::Error::InvalidSelector { .. })
        ));
    }

    #[test]
    fn blank_token_means_unauthenticated() {
        let mut cli = base_cli();
        cli.user_token = Some("  ".to_string());
        let cfg = resolve_with_file(&cli, FileConfig::default(), today()).unwrap();
        assert!(cfg.user_token.is_none());
    }

    #[test]
    fn explicit_config_path_must_exist() {
        let dir = tempdir().unwrap();
        let mut cli = base_cli();
        cli.dir = dir.path().to_path_buf();
        cli.config = Some(dir.path().join("missing.toml"));
        let err = resolve_config(&cli, today()).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn config_file_in_base_dir_is_picked_up() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "runs = 3\njobs = 2\n").unwrap();
        let mut cli = base_cli();
        cli.dir = dir.path().to_path_buf();
        let cfg = resolve_config(&cli, today()).unwrap();
        assert_eq!(cfg.run_count, 3);
        assert_eq!(cfg.jobs, 2);
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(
            expand_home(Path::new("/srv/openaps")),
            PathBuf::from("/srv/openaps")
        );
        assert_eq!(expand_home(Path::new("rel/dir")), PathBuf::from("rel/dir"));
    }
}
