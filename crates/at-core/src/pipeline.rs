//! End-to-end control flow for one invocation.
//!
//! Partition and persist the date range, stage the pump baseline, then for
//! each selected weekday: seed, fetch telemetry, run the chain. Weekdays are
//! independent (each owns its slot and artifact names) and may run on a
//! bounded pool of scoped threads. Reporting runs last and never changes the
//! outcome.

use crate::cancel::CancelToken;
use crate::exit_codes::ExitCode;
use crate::fetch::{TelemetryFetcher, TelemetrySource};
use crate::partition::{self, load_bucket};
use crate::report::{Digest, ReportingBridge};
use crate::scheduler::{RunScheduler, WeekdayOutcome};
use crate::seed::ProfileSeeder;
use crate::store::ArtifactStore;
use crate::tool::Toolbox;
use at_common::{Error, InvocationId, Result, WeekdaySelector, SCHEMA_VERSION};
use at_config::AutotuneConfig;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::thread;
use tracing::{info, info_span, warn};

/// Summary of one invocation, also written as JSON next to the artifacts.
#[derive(Debug, Serialize)]
pub struct PipelineReport {
    pub schema_version: &'static str,
    pub invocation_id: InvocationId,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub run_count: u32,
    pub weekdays: Vec<WeekdayOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<Digest>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub reporting_errors: Vec<String>,
    #[serde(skip)]
    pub summary_path: Option<PathBuf>,
}

impl PipelineReport {
    pub fn finalized(&self) -> usize {
        self.weekdays.iter().filter(|w| w.is_finalized()).count()
    }

    pub fn was_cancelled(&self) -> bool {
        self.weekdays.iter().any(WeekdayOutcome::was_cancelled)
    }

    pub fn exit_code(&self) -> ExitCode {
        if self.was_cancelled() {
            ExitCode::Interrupted
        } else if self.finalized() < self.weekdays.len() {
            ExitCode::PartialFail
        } else {
            ExitCode::Clean
        }
    }
}

pub struct Pipeline<'a> {
    config: &'a AutotuneConfig,
    tools: &'a Toolbox,
    source: &'a dyn TelemetrySource,
    cancel: &'a CancelToken,
    store: ArtifactStore,
    invocation_id: InvocationId,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        config: &'a AutotuneConfig,
        tools: &'a Toolbox,
        source: &'a dyn TelemetrySource,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            config,
            tools,
            source,
            cancel,
            store: ArtifactStore::from_config(config),
            invocation_id: InvocationId::new(),
        }
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    /// Run the whole invocation.
    ///
    /// `Err` means nothing was tuned (bad input, missing pump profile).
    /// Per-weekday failures are reported inside the [`PipelineReport`].
    pub fn run(&self) -> Result<PipelineReport> {
        let started_at = Utc::now();
        let config = self.config;
        info!(
            invocation = %self.invocation_id,
            start = %config.start_date,
            end = %config.end_date,
            runs = config.run_count,
            jobs = config.jobs,
            "autotune invocation starting"
        );

        let buckets = partition::partition(config.start_date, config.end_date, &config.weekdays)?;
        self.store.ensure_dirs()?;
        partition::persist(&buckets, &self.store)?;
        info!(
            weekdays = buckets.selectors().count(),
            dates = buckets.total_dates(),
            "date lists written"
        );

        ProfileSeeder::new(&self.store).stage_baseline()?;

        let selectors: Vec<WeekdaySelector> = buckets.selectors().collect();
        let weekdays = self.run_weekdays(&selectors);

        let mut report = PipelineReport {
            schema_version: SCHEMA_VERSION,
            invocation_id: self.invocation_id.clone(),
            started_at,
            finished_at: started_at,
            start_date: config.start_date,
            end_date: config.end_date,
            run_count: config.run_count,
            weekdays,
            export: None,
            digest: None,
            reporting_errors: Vec::new(),
            summary_path: None,
        };

        if report.was_cancelled() {
            warn!("cancelled; skipping reports");
        } else {
            self.run_reports(&mut report);
        }

        report.finished_at = Utc::now();
        report.summary_path = self.write_summary(&report);
        info!(
            finalized = report.finalized(),
            weekdays = report.weekdays.len(),
            "autotune invocation finished"
        );
        Ok(report)
    }

    /// Write the JSON summary; a failure is logged, not returned.
    fn write_summary(&self, report: &PipelineReport) -> Option<PathBuf> {
        let name = format!("{}.summary.json", self.invocation_id);
        let written = serde_json::to_vec_pretty(report)
            .map_err(Error::from)
            .and_then(|json| self.store.write_named(&name, &json));
        match written {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "could not write invocation summary");
                None
            }
        }
    }

    fn run_weekdays(&self, selectors: &[WeekdaySelector]) -> Vec<WeekdayOutcome> {
        let jobs = self.config.jobs.clamp(1, selectors.len().max(1));
        if jobs == 1 {
            return selectors.iter().map(|w| self.run_weekday(*w)).collect();
        }

        let queue = Mutex::new(selectors.iter().copied().collect::<VecDeque<_>>());
        let results = Mutex::new(Vec::with_capacity(selectors.len()));
        thread::scope(|scope| {
            for _ in 0..jobs {
                scope.spawn(|| loop {
                    let next = queue.lock().map(|mut q| q.pop_front()).unwrap_or(None);
                    let Some(weekday) = next else { break };
                    let outcome = self.run_weekday(weekday);
                    if let Ok(mut done) = results.lock() {
                        done.push(outcome);
                    }
                });
            }
        });
        let mut outcomes = results.into_inner().unwrap_or_default();
        outcomes.sort_by_key(|o| o.weekday);
        outcomes
    }

    fn run_weekday(&self, weekday: WeekdaySelector) -> WeekdayOutcome {
        let span = info_span!("weekday", %weekday);
        let _guard = span.enter();
        let run_count = self.config.run_count;

        let dates = match load_bucket(&self.store, weekday) {
            Ok(dates) => dates,
            Err(e) => return WeekdayOutcome::failed_before_chain(weekday, &[], run_count, e),
        };
        if self.cancel.is_cancelled() {
            return WeekdayOutcome::failed_before_chain(
                weekday,
                &dates,
                run_count,
                Error::Cancelled,
            );
        }

        let seed = match ProfileSeeder::new(&self.store).seed(weekday) {
            Ok(seed) => seed,
            Err(e) => {
                warn!(error = %e, "seeding failed");
                return WeekdayOutcome::failed_before_chain(weekday, &dates, run_count, e);
            }
        };

        let fetcher = TelemetryFetcher::new(self.source, &self.store, self.config);
        if let Err(e) = fetcher.fetch_all(&dates, self.cancel) {
            warn!(error = %e, "telemetry fetch failed; skipping weekday");
            return WeekdayOutcome::failed_before_chain(weekday, &dates, run_count, e);
        }

        RunScheduler::new(
            self.tools.prep.as_ref(),
            self.tools.core.as_ref(),
            &self.store,
            self.cancel,
        )
        .with_policy(self.config.on_tool_failure)
        .run(&seed, &dates, run_count)
    }

    fn run_reports(&self, report: &mut PipelineReport) {
        let bridge = ReportingBridge::new(self.tools.report.as_ref(), self.tools.export.as_ref());
        let base_dir = &self.config.base_dir;

        if let Some(filename) = &self.config.export_xlsx {
            match bridge.export(base_dir, filename) {
                Ok(()) => report.export = Some(filename.clone()),
                Err(e) => {
                    warn!(error = %e, "spreadsheet export failed");
                    report.reporting_errors.push(e.to_string());
                }
            }
        }

        if self.config.report {
            match bridge.summarize(base_dir) {
                Ok(digest) => report.digest = Some(digest),
                Err(e) => {
                    warn!(error = %e, "recommendations report failed");
                    report.reporting_errors.push(e.to_string());
                }
            }
        }
    }
}
