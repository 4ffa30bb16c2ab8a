//! Error types for the autotune harness.

use crate::artifact::{TelemetryStream, ToolStage};
use crate::weekday::WeekdaySelector;
use chrono::NaiveDate;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for harness operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Unified error type for the harness.
#[derive(Error, Debug)]
pub enum Error {
    // Input errors (10-19)
    #[error("invalid date range: start {start} must be before end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("invalid weekday selector {input:?}: expected 1 (Monday) through 7 (Sunday)")]
    InvalidSelector { input: String },

    #[error("configuration error: {0}")]
    Config(String),

    // Telemetry errors (20-29)
    #[error("failed to fetch {stream} for {date}: {cause}")]
    TelemetryFetch {
        date: NaiveDate,
        stream: TelemetryStream,
        cause: String,
    },

    // Chain errors (30-39)
    #[error("{stage} failed for weekday {weekday}, run {run}, date {date}: {reason}")]
    ExternalTool {
        stage: ToolStage,
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
        reason: String,
    },

    #[error("cancelled")]
    Cancelled,

    // Artifact errors (40-49)
    #[error("missing artifact: {}", path.display())]
    MissingArtifact { path: PathBuf },

    // Reporting errors (50-59)
    #[error("reporting failed: {0}")]
    Reporting(String),

    // I/O errors (60-69)
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the error code for this error type.
    /// Used for detailed error reporting in the JSON summary.
    pub fn code(&self) -> u32 {
        match self {
            Error::InvalidRange { .. } => 10,
            Error::InvalidSelector { .. } => 11,
            Error::Config(_) => 12,
            Error::TelemetryFetch { .. } => 20,
            Error::ExternalTool { .. } => 30,
            Error::Cancelled => 31,
            Error::MissingArtifact { .. } => 40,
            Error::Reporting(_) => 50,
            Error::Io { .. } => 60,
            Error::Json(_) => 61,
        }
    }

    /// Errors raised before any work begins (bad CLI input or config).
    pub fn is_input_error(&self) -> bool {
        self.code() < 20
    }
}
