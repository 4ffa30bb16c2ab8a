//! Structured artifact keys.
//!
//! Every file the harness reads or writes in the `autotune/` working
//! directory is addressed by an [`ArtifactKey`]. File names match the layout
//! the downstream report tool expects:
//!
//! ```text
//! autotune/
//! ├── date-list.txt                  # combined "<dow>: <date>" listing
//! ├── date-list.<dow>.txt            # one date per line
//! ├── ns-treatments.<date>.json
//! ├── ns-entries.<date>.json
//! ├── profile.pump.json              # global pump baseline
//! ├── profile.pump.<dow>.json        # per-weekday pump checkpoint
//! ├── profile.pump.active.<dow>.json # tool input while a weekday runs
//! ├── profile-day<dow>.json          # working profile slot
//! ├── profile.<run>.<date>.json      # per-step snapshot
//! ├── autotune.<run>.<date>.json     # prep output
//! ├── newprofile.<run>.<date>.json   # core output
//! └── profile.tuned.<dow>.json       # final tuned profile
//! ```

use crate::weekday::WeekdaySelector;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// The two remote telemetry streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryStream {
    /// Carb and insulin treatments.
    Treatments,
    /// Glucose (sgv) entries.
    Entries,
}

impl fmt::Display for TelemetryStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Treatments => write!(f, "treatments"),
            Self::Entries => write!(f, "entries"),
        }
    }
}

/// External tool stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStage {
    Prep,
    Core,
    Report,
    Export,
}

impl fmt::Display for ToolStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Prep => write!(f, "prep"),
            Self::Core => write!(f, "core"),
            Self::Report => write!(f, "report"),
            Self::Export => write!(f, "export"),
        }
    }
}

/// Coarse artifact classification, used for logging and listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    DateListing,
    DateList,
    Treatments,
    Entries,
    PumpBaseline,
    PumpCheckpoint,
    PumpActive,
    WorkingProfile,
    Snapshot,
    Prepped,
    RunResult,
    TunedProfile,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::DateListing => "date_listing",
            Self::DateList => "date_list",
            Self::Treatments => "treatments",
            Self::Entries => "entries",
            Self::PumpBaseline => "pump_baseline",
            Self::PumpCheckpoint => "pump_checkpoint",
            Self::PumpActive => "pump_active",
            Self::WorkingProfile => "working_profile",
            Self::Snapshot => "snapshot",
            Self::Prepped => "prepped",
            Self::RunResult => "run_result",
            Self::TunedProfile => "tuned_profile",
        };
        f.write_str(label)
    }
}

/// Key of a single artifact in the working directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKey {
    DateListing,
    DateList { weekday: WeekdaySelector },
    Telemetry {
        stream: TelemetryStream,
        weekday: WeekdaySelector,
        date: NaiveDate,
    },
    PumpBaseline,
    PumpCheckpoint { weekday: WeekdaySelector },
    PumpActive { weekday: WeekdaySelector },
    WorkingProfile { weekday: WeekdaySelector },
    Snapshot {
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
    },
    Prepped {
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
    },
    RunResult {
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
    },
    TunedProfile { weekday: WeekdaySelector },
}

impl ArtifactKey {
    pub fn treatments(date: NaiveDate) -> Self {
        ArtifactKey::Telemetry {
            stream: TelemetryStream::Treatments,
            weekday: WeekdaySelector::of(date),
            date,
        }
    }

    pub fn entries(date: NaiveDate) -> Self {
        ArtifactKey::Telemetry {
            stream: TelemetryStream::Entries,
            weekday: WeekdaySelector::of(date),
            date,
        }
    }

    pub fn telemetry(stream: TelemetryStream, date: NaiveDate) -> Self {
        match stream {
            TelemetryStream::Treatments => Self::treatments(date),
            TelemetryStream::Entries => Self::entries(date),
        }
    }

    pub fn kind(&self) -> ArtifactKind {
        match self {
            ArtifactKey::DateListing => ArtifactKind::DateListing,
            ArtifactKey::DateList { .. } => ArtifactKind::DateList,
            ArtifactKey::Telemetry {
                stream: TelemetryStream::Treatments,
                ..
            } => ArtifactKind::Treatments,
            ArtifactKey::Telemetry {
                stream: TelemetryStream::Entries,
                ..
            } => ArtifactKind::Entries,
            ArtifactKey::PumpBaseline => ArtifactKind::PumpBaseline,
            ArtifactKey::PumpCheckpoint { .. } => ArtifactKind::PumpCheckpoint,
            ArtifactKey::PumpActive { .. } => ArtifactKind::PumpActive,
            ArtifactKey::WorkingProfile { .. } => ArtifactKind::WorkingProfile,
            ArtifactKey::Snapshot { .. } => ArtifactKind::Snapshot,
            ArtifactKey::Prepped { .. } => ArtifactKind::Prepped,
            ArtifactKey::RunResult { .. } => ArtifactKind::RunResult,
            ArtifactKey::TunedProfile { .. } => ArtifactKind::TunedProfile,
        }
    }

    /// File name relative to the working directory.
    pub fn file_name(&self) -> String {
        match *self {
            ArtifactKey::DateListing => "date-list.txt".to_string(),
            ArtifactKey::DateList { weekday } => format!("date-list.{weekday}.txt"),
            ArtifactKey::Telemetry {
                stream: TelemetryStream::Treatments,
                date,
                ..
            } => format!("ns-treatments.{}.json", date.format(DATE_FORMAT)),
            ArtifactKey::Telemetry {
                stream: TelemetryStream::Entries,
                date,
                ..
            } => format!("ns-entries.{}.json", date.format(DATE_FORMAT)),
            ArtifactKey::PumpBaseline => "profile.pump.json".to_string(),
            ArtifactKey::PumpCheckpoint { weekday } => format!("profile.pump.{weekday}.json"),
            ArtifactKey::PumpActive { weekday } => format!("profile.pump.active.{weekday}.json"),
            ArtifactKey::WorkingProfile { weekday } => format!("profile-day{weekday}.json"),
            ArtifactKey::Snapshot { run, date, .. } => {
                format!("profile.{run}.{}.json", date.format(DATE_FORMAT))
            }
            ArtifactKey::Prepped { run, date, .. } => {
                format!("autotune.{run}.{}.json", date.format(DATE_FORMAT))
            }
            ArtifactKey::RunResult { run, date, .. } => {
                format!("newprofile.{run}.{}.json", date.format(DATE_FORMAT))
            }
            ArtifactKey::TunedProfile { weekday } => format!("profile.tuned.{weekday}.json"),
        }
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name())
    }
}
