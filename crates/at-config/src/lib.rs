//! Autotune day-of-week harness configuration.
//!
//! This crate provides:
//! - The immutable [`AutotuneConfig`] threaded through every component
//! - An optional TOML config file ([`FileConfig`])
//! - Resolution (CLI → env → config file → defaults)
//! - Semantic validation

pub mod file;
pub mod policy;
pub mod resolve;
pub mod settings;
pub mod validate;

pub use file::{load_file_config, FileConfig};
pub use policy::ToolFailurePolicy;
pub use resolve::{expand_home, resolve_config, CliOverrides};
pub use settings::{AutotuneConfig, FetchSettings, ToolCommands};
pub use validate::validate;

use std::path::PathBuf;
use thiserror::Error;

/// Default config file name, looked up in the base directory.
pub const CONFIG_FILE_NAME: &str = "autotune-dow.toml";

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },

    #[error(transparent)]
    Input(#[from] at_common::Error),
}

impl From<ConfigError> for at_common::Error {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Input(inner) => inner,
            other => at_common::Error::Config(other.to_string()),
        }
    }
}
