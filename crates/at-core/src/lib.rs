//! Day-of-week partitioned Autotune harness.
//!
//! Splits a date range by weekday, pulls telemetry for each date, and drives
//! the external Prep and Core tools through an ordered refinement chain per
//! weekday, yielding one tuned profile per day of the week.

pub mod cancel;
pub mod cli;
pub mod exit_codes;
pub mod fetch;
pub mod logging;
pub mod partition;
pub mod pipeline;
pub mod report;
pub mod scheduler;
pub mod seed;
pub mod store;
pub mod tool;

pub use cancel::{install_interrupt_handler, CancelToken};
pub use exit_codes::ExitCode;
pub use fetch::{NightscoutClient, TelemetryFetcher, TelemetryPair, TelemetrySource};
pub use partition::{partition, partition_codes, BucketWriter, DateBuckets};
pub use pipeline::{Pipeline, PipelineReport};
pub use report::{Digest, ReportingBridge};
pub use scheduler::{ChainState, RunScheduler, StepRecord, WeekdayOutcome};
pub use seed::{ProfileSeeder, Seed, SeedOrigin};
pub use store::ArtifactStore;
pub use tool::{ExternalTool, SubprocessTool, ToolError, ToolInvocation, ToolRun, Toolbox};
