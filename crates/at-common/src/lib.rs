//! Autotune day-of-week harness common types and errors.
//!
//! This crate provides foundational types shared across the harness crates:
//! - Weekday selectors with a single validated numbering convention
//! - Structured artifact keys for the on-disk handoff between stages
//! - Invocation identifiers
//! - The unified error type and its numeric codes

pub mod artifact;
pub mod error;
pub mod id;
pub mod weekday;

pub use artifact::{ArtifactKey, ArtifactKind, TelemetryStream, ToolStage};
pub use error::{Error, Result};
pub use id::InvocationId;
pub use weekday::WeekdaySelector;

/// Schema version for the JSON summary written at the end of an invocation.
pub const SCHEMA_VERSION: &str = "1.0.0";
