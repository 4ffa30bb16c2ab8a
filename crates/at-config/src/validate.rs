//! Semantic validation of a resolved configuration.

use crate::settings::AutotuneConfig;
use crate::ConfigError;

/// Upper bound on weekday workers; there are only seven chains.
const MAX_JOBS: usize = 7;

pub fn validate(config: &AutotuneConfig) -> Result<(), ConfigError> {
    if config.start_date >= config.end_date {
        return Err(ConfigError::Input(at_common::Error::InvalidRange {
            start: config.start_date,
            end: config.end_date,
        }));
    }
    if !(config.ns_host.starts_with("http://") || config.ns_host.starts_with("https://")) {
        return Err(ConfigError::Invalid {
            field: "ns_host",
            message: format!("'{}' must start with http:// or https://", config.ns_host),
        });
    }
    if config.run_count == 0 {
        return Err(ConfigError::Invalid {
            field: "runs",
            message: "must be at least 1".to_string(),
        });
    }
    if config.jobs == 0 || config.jobs > MAX_JOBS {
        return Err(ConfigError::Invalid {
            field: "jobs",
            message: format!("must be between 1 and {MAX_JOBS}, got {}", config.jobs),
        });
    }
    if config.tool_timeout_secs == 0 {
        return Err(ConfigError::Invalid {
            field: "tool_timeout_secs",
            message: "must be positive".to_string(),
        });
    }
    if config.fetch.entries_count == 0 {
        return Err(ConfigError::Invalid {
            field: "fetch.entries_count",
            message: "must be positive".to_string(),
        });
    }
    for (field, command) in [
        ("tools.prep", &config.tools.prep),
        ("tools.core", &config.tools.core),
        ("tools.report", &config.tools.report),
        ("tools.export", &config.tools.export),
    ] {
        if command.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field,
                message: "command must not be empty".to_string(),
            });
        }
    }
    Ok(())
}
