//! Optional TOML config file.
//!
//! Every field is optional; anything set on the command line wins.
//!
//! ```toml
//! runs = 3
//! days_of_week = "1,2,3,4,5"
//! jobs = 2
//! tool_timeout_secs = 900
//! on_tool_failure = "warn"
//!
//! [tools]
//! prep = "/usr/local/bin/oref0-autotune-prep"
//!
//! [fetch]
//! retries = 4
//! reuse_existing = true
//! ```

use crate::policy::ToolFailurePolicy;
use crate::settings::{FetchSettings, ToolCommands};
use crate::ConfigError;
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub ns_host: Option<String>,
    pub user_token: Option<String>,
    pub runs: Option<u32>,
    pub days_of_week: Option<String>,
    pub xlsx: Option<String>,
    pub log: Option<bool>,
    pub report: Option<bool>,
    pub jobs: Option<usize>,
    pub tool_timeout_secs: Option<u64>,
    pub on_tool_failure: Option<ToolFailurePolicy>,
    pub tools: Option<ToolCommands>,
    pub fetch: Option<FetchSettings>,
}

/// Load a config file. A missing file yields the empty config.
pub fn load_file_config(path: &Path) -> Result<FileConfig, ConfigError> {
    if !path.exists() {
        return Ok(FileConfig::default());
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_is_empty_config() {
        let dir = tempdir().unwrap();
        let cfg = load_file_config(&dir.path().join("nope.toml")).unwrap();
        assert!(cfg.runs.is_none());
        assert!(cfg.tools.is_none());
    }

    #[test]
    fn parses_nested_tables() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("autotune-dow.toml");
        std::fs::write(
            &path,
            r#"
runs = 3
on_tool_failure = "warn"

[tools]
prep = "/opt/prep"

[fetch]
retries = 0
"#,
        )
        .unwrap();
        let cfg = load_file_config(&path).unwrap();
        assert_eq!(cfg.runs, Some(3));
        assert_eq!(cfg.on_tool_failure, Some(ToolFailurePolicy::Warn));
        let tools = cfg.tools.unwrap();
        assert_eq!(tools.prep, "/opt/prep");
        assert_eq!(tools.core, "oref0-autotune-core");
        let fetch = cfg.fetch.unwrap();
        assert_eq!(fetch.retries, 0);
        assert_eq!(fetch.entries_count, 1500);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "runz = 3\n").unwrap();
        let err = load_file_config(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
