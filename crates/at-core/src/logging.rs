//! Tracing subscriber setup.
//!
//! Logs go to stderr, filtered by `RUST_LOG` (default `info`). With terminal
//! logging enabled they are also teed into a timestamped file in the working
//! directory.

use at_common::{Error, Result};
use chrono::Local;
use clap::ValueEnum;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Log file name for an invocation starting now.
pub fn log_file_name() -> String {
    format!("autotune.{}.log", Local::now().format("%Y%m%d-%H%M%S"))
}

/// Install the global subscriber.
///
/// Returns the log file path when `tee_dir` is given.
pub fn init_logging(format: LogFormat, tee_dir: Option<&Path>) -> Result<Option<PathBuf>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let Some(dir) = tee_dir else {
        let installed = match format {
            LogFormat::Text => builder.with_writer(std::io::stderr).try_init(),
            LogFormat::Json => builder.json().with_writer(std::io::stderr).try_init(),
        };
        installed.map_err(|e| Error::Config(format!("logging: {e}")))?;
        return Ok(None);
    };

    fs::create_dir_all(dir).map_err(|e| Error::io(dir, e))?;
    let path = dir.join(log_file_name());
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| Error::io(&path, e))?;
    let writer = std::io::stderr.and(Mutex::new(file));
    let installed = match format {
        LogFormat::Text => builder.with_ansi(false).with_writer(writer).try_init(),
        LogFormat::Json => builder.json().with_writer(writer).try_init(),
    };
    installed.map_err(|e| Error::Config(format!("logging: {e}")))?;
    Ok(Some(path))
}
