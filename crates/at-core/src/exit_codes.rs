//! Exit codes for the `autotune-dow` binary.
//!
//! Exit codes communicate the outcome without requiring log parsing.

use at_common::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Every selected weekday finalized
    Clean = 0,

    /// At least one weekday aborted
    PartialFail = 3,

    /// Interrupted; finished steps are kept and the run can be resumed
    Interrupted = 6,

    /// Invalid arguments or configuration
    ConfigError = 10,

    /// I/O error or missing input file
    IoError = 13,

    /// Internal/unknown error
    InternalError = 99,
}

impl ExitCode {
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Exit code for an error that stopped the whole invocation.
    pub fn for_error(err: &Error) -> Self {
        match err {
            e if e.is_input_error() => ExitCode::ConfigError,
            Error::Cancelled => ExitCode::Interrupted,
            Error::Io { .. } | Error::MissingArtifact { .. } => ExitCode::IoError,
            _ => ExitCode::InternalError,
        }
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code as i32
    }
}
