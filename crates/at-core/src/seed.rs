//! Profile seeding.
//!
//! Before a weekday chain starts, its working profile slot must hold a
//! profile and a pump profile must be chosen for the tools to compare
//! against. A slot left behind by an earlier invocation is resumed as is.

use crate::store::{ArtifactStore, PUMP_PROFILE_FILE, SETTINGS_PROFILE_FILE};
use at_common::{ArtifactKey, Result, WeekdaySelector};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info};

/// Where a weekday's working profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeedOrigin {
    /// The slot already existed and was left untouched.
    Resumed,
    /// The slot was filled from the operator's settings.
    Baseline,
}

/// Starting state of one weekday chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Seed {
    pub weekday: WeekdaySelector,
    pub origin: SeedOrigin,
    /// Pump profile the chain starts from.
    #[serde(serialize_with = "serialize_key")]
    pub pump_source: ArtifactKey,
}

fn serialize_key<S: serde::Serializer>(
    key: &ArtifactKey,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    s.collect_str(key)
}

pub struct ProfileSeeder<'a> {
    store: &'a ArtifactStore,
}

impl<'a> ProfileSeeder<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }

    /// Profile a fresh weekday slot starts from: `settings/profile.json`
    /// when the operator keeps one, otherwise the pump profile itself.
    pub fn baseline_profile(&self) -> PathBuf {
        let profile = self.store.settings_path(SETTINGS_PROFILE_FILE);
        if profile.is_file() {
            profile
        } else {
            self.store.settings_path(PUMP_PROFILE_FILE)
        }
    }

    /// Copy the operator's pump profile into the working directory.
    ///
    /// Runs once per invocation, before any weekday is seeded.
    pub fn stage_baseline(&self) -> Result<()> {
        let pump = self.store.settings_path(PUMP_PROFILE_FILE);
        self.store.import(&pump, &ArtifactKey::PumpBaseline)?;
        info!(from = %pump.display(), "pump profile staged");
        Ok(())
    }

    pub fn seed(&self, weekday: WeekdaySelector) -> Result<Seed> {
        let slot = ArtifactKey::WorkingProfile { weekday };
        let origin = if self.store.exists(&slot) {
            SeedOrigin::Resumed
        } else {
            let baseline = self.baseline_profile();
            self.store.import(&baseline, &slot)?;
            SeedOrigin::Baseline
        };

        let checkpoint = ArtifactKey::PumpCheckpoint { weekday };
        let pump_source = if self.store.exists(&checkpoint) {
            checkpoint
        } else {
            ArtifactKey::PumpBaseline
        };
        if !self.store.exists(&pump_source) {
            // Surface the missing file now rather than from inside the chain.
            self.store.read(&pump_source)?;
        }

        debug!(%weekday, ?origin, pump = %pump_source, "weekday seeded");
        Ok(Seed {
            weekday,
            origin,
            pump_source,
        })
    }
}
