//! Per-weekday refinement chain.
//!
//! For one weekday the scheduler runs `run_count` passes over the weekday's
//! dates in ascending order. Every step snapshots the working profile, runs
//! Prep then Core against it, and replaces the working profile with Core's
//! output. The next step therefore always sees the previous step's result.
//!
//! # State Machine
//!
//! ```text
//! Seeded ──▶ Pass(1) ──▶ .. ──▶ Pass(R) ──▶ Finalized
//!   │           │                  │
//!   ▼           ▼                  ▼
//! Aborted    Aborted            Aborted
//! ```
//!
//! The chain is not idempotent: a second invocation over the same weekday
//! starts from the tuned slot the first one left behind. Delete
//! `profile-day<dow>.json` and `profile.pump.<dow>.json` to start over.

use crate::cancel::CancelToken;
use crate::seed::{Seed, SeedOrigin};
use crate::store::ArtifactStore;
use crate::tool::{ExternalTool, ToolInvocation};
use at_common::{ArtifactKey, Error, Result, ToolStage, WeekdaySelector};
use at_config::ToolFailurePolicy;
use chrono::NaiveDate;
use serde::{Serialize, Serializer};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Runtime state of a weekday chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ChainState {
    Seeded,
    Pass { run: u32 },
    Finalized,
    Aborted,
}

impl ChainState {
    pub fn is_terminal(self) -> bool {
        matches!(self, ChainState::Finalized | ChainState::Aborted)
    }

    pub fn can_transition_to(self, next: ChainState) -> bool {
        match (self, next) {
            (s, ChainState::Aborted) => !s.is_terminal(),
            (ChainState::Seeded, ChainState::Pass { run }) => run == 1,
            (ChainState::Pass { run: a }, ChainState::Pass { run: b }) => b == a + 1,
            (ChainState::Seeded | ChainState::Pass { .. }, ChainState::Finalized) => true,
            _ => false,
        }
    }
}

/// Result of one tool within a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status", content = "reason")]
pub enum StageStatus {
    Ok,
    Failed(String),
    Skipped,
}

/// One `(run, date)` step of the chain.
#[derive(Debug, Clone, Serialize)]
pub struct StepRecord {
    pub run: u32,
    pub date: NaiveDate,
    pub prep: StageStatus,
    pub core: StageStatus,
    /// Whether the working profile was replaced by this step's result.
    pub advanced: bool,
    pub duration_ms: u64,
}

/// Everything one weekday chain did.
#[derive(Debug, Serialize)]
pub struct WeekdayOutcome {
    pub weekday: WeekdaySelector,
    pub origin: SeedOrigin,
    #[serde(flatten)]
    pub state: ChainState,
    pub dates: Vec<NaiveDate>,
    pub run_count: u32,
    pub steps: Vec<StepRecord>,
    /// Steps whose failure was tolerated under the `warn` policy.
    pub warnings: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tuned_profile: Option<PathBuf>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_error"
    )]
    pub error: Option<Error>,
}

#[derive(Serialize)]
struct ErrorSummary<'a> {
    code: u32,
    message: &'a str,
}

fn serialize_error<S: Serializer>(
    error: &Option<Error>,
    s: S,
) -> std::result::Result<S::Ok, S::Error> {
    match error {
        Some(e) => ErrorSummary {
            code: e.code(),
            message: &e.to_string(),
        }
        .serialize(s),
        None => s.serialize_none(),
    }
}

impl WeekdayOutcome {
    fn new(seed: &Seed, dates: &[NaiveDate], run_count: u32) -> Self {
        Self {
            weekday: seed.weekday,
            origin: seed.origin,
            state: ChainState::Seeded,
            dates: dates.to_vec(),
            run_count,
            steps: Vec::new(),
            warnings: 0,
            tuned_profile: None,
            error: None,
        }
    }

    /// Outcome for a weekday that failed before its chain could start.
    pub fn failed_before_chain(
        weekday: WeekdaySelector,
        dates: &[NaiveDate],
        run_count: u32,
        error: Error,
    ) -> Self {
        Self {
            weekday,
            origin: SeedOrigin::Baseline,
            state: ChainState::Aborted,
            dates: dates.to_vec(),
            run_count,
            steps: Vec::new(),
            warnings: 0,
            tuned_profile: None,
            error: Some(error),
        }
    }

    fn transition(&mut self, next: ChainState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal chain transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn abort(mut self, err: Error) -> Self {
        self.transition(ChainState::Aborted);
        self.error = Some(err);
        self
    }

    pub fn is_finalized(&self) -> bool {
        self.state == ChainState::Finalized
    }

    pub fn was_cancelled(&self) -> bool {
        matches!(self.error, Some(Error::Cancelled))
    }

    /// Steps whose Core output became the working profile.
    pub fn advanced_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.advanced).count()
    }
}

/// A step failure and whether the policy may tolerate it.
enum StepError {
    Tool { record: StepRecord, error: Error },
    Fatal(Error),
}

pub struct RunScheduler<'a> {
    prep: &'a dyn ExternalTool,
    core: &'a dyn ExternalTool,
    store: &'a ArtifactStore,
    policy: ToolFailurePolicy,
    cancel: &'a CancelToken,
}

impl<'a> RunScheduler<'a> {
    pub fn new(
        prep: &'a dyn ExternalTool,
        core: &'a dyn ExternalTool,
        store: &'a ArtifactStore,
        cancel: &'a CancelToken,
    ) -> Self {
        Self {
            prep,
            core,
            store,
            policy: ToolFailurePolicy::default(),
            cancel,
        }
    }

    pub fn with_policy(mut self, policy: ToolFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Run the chain for a seeded weekday over `dates` (ascending).
    pub fn run(&self, seed: &Seed, dates: &[NaiveDate], run_count: u32) -> WeekdayOutcome {
        let weekday = seed.weekday;
        let mut outcome = WeekdayOutcome::new(seed, dates, run_count);
        info!(
            %weekday,
            dates = dates.len(),
            runs = run_count,
            origin = ?seed.origin,
            "starting weekday chain"
        );

        let active = ArtifactKey::PumpActive { weekday };
        if let Err(e) = self.store.copy(&seed.pump_source, &active) {
            return outcome.abort(e);
        }

        for run in 1..=run_count {
            outcome.transition(ChainState::Pass { run });
            for &date in dates {
                if self.cancel.is_cancelled() {
                    warn!(%weekday, run, %date, "cancelled before step");
                    return outcome.abort(Error::Cancelled);
                }
                match self.step(weekday, run, date) {
                    Ok(record) => outcome.steps.push(record),
                    Err(StepError::Fatal(e)) => {
                        error!(%weekday, run, %date, error = %e, "weekday chain aborted");
                        return outcome.abort(e);
                    }
                    Err(StepError::Tool { record, error: e }) => {
                        outcome.steps.push(record);
                        match self.policy {
                            ToolFailurePolicy::Fatal => {
                                error!(%weekday, run, %date, error = %e, "weekday chain aborted");
                                return outcome.abort(e);
                            }
                            ToolFailurePolicy::Warn => {
                                warn!(%weekday, run, %date, error = %e, "step failed, continuing");
                                outcome.warnings += 1;
                            }
                        }
                    }
                }
            }
        }

        match self.finalize(weekday) {
            Ok(tuned) => {
                outcome.transition(ChainState::Finalized);
                info!(
                    %weekday,
                    steps = outcome.steps.len(),
                    advanced = outcome.advanced_steps(),
                    tuned = %tuned.display(),
                    "weekday chain finalized"
                );
                outcome.tuned_profile = Some(tuned);
                outcome
            }
            Err(e) => outcome.abort(e),
        }
    }

    fn step(
        &self,
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
    ) -> std::result::Result<StepRecord, StepError> {
        let started = Instant::now();
        let slot = ArtifactKey::WorkingProfile { weekday };
        let snapshot = ArtifactKey::Snapshot { weekday, run, date };
        let prepped = ArtifactKey::Prepped { weekday, run, date };
        let result = ArtifactKey::RunResult { weekday, run, date };
        let pump = ArtifactKey::PumpActive { weekday };
        let treatments = ArtifactKey::treatments(date);
        let entries = ArtifactKey::entries(date);

        for key in [&treatments, &entries] {
            if !self.store.exists(key) {
                return Err(StepError::Fatal(Error::MissingArtifact {
                    path: self.store.path(key),
                }));
            }
        }

        self.store.copy(&slot, &snapshot).map_err(StepError::Fatal)?;

        let mut record = StepRecord {
            run,
            date,
            prep: StageStatus::Skipped,
            core: StageStatus::Skipped,
            advanced: false,
            duration_ms: 0,
        };

        let prep_call = ToolInvocation::new(ToolStage::Prep)
            .arg(self.store.path(&treatments))
            .arg(self.store.path(&snapshot))
            .arg(self.store.path(&entries))
            .arg(self.store.path(&pump))
            .stdout_to(self.store.path(&prepped));
        if let Err(reason) = self.call(self.prep, &prep_call, &prepped) {
            record.prep = StageStatus::Failed(reason.clone());
            record.duration_ms = started.elapsed().as_millis() as u64;
            return Err(self.tool_failure(
                record,
                ToolStage::Prep,
                weekday,
                run,
                date,
                reason,
            ));
        }
        record.prep = StageStatus::Ok;

        let core_call = ToolInvocation::new(ToolStage::Core)
            .arg(self.store.path(&prepped))
            .arg(self.store.path(&snapshot))
            .arg(self.store.path(&pump))
            .stdout_to(self.store.path(&result));
        if let Err(reason) = self.call(self.core, &core_call, &result) {
            record.core = StageStatus::Failed(reason.clone());
            record.duration_ms = started.elapsed().as_millis() as u64;
            return Err(self.tool_failure(
                record,
                ToolStage::Core,
                weekday,
                run,
                date,
                reason,
            ));
        }
        record.core = StageStatus::Ok;

        self.store.copy(&result, &slot).map_err(StepError::Fatal)?;
        record.advanced = true;
        record.duration_ms = started.elapsed().as_millis() as u64;
        info!(%weekday, run, %date, duration_ms = record.duration_ms, "step complete");
        Ok(record)
    }

    /// Run one tool; `Err` carries a human-readable failure reason.
    fn call(
        &self,
        tool: &dyn ExternalTool,
        invocation: &ToolInvocation,
        output: &ArtifactKey,
    ) -> std::result::Result<(), String> {
        let run = tool.invoke(invocation).map_err(|e| e.to_string())?;
        debug!(
            stage = %invocation.stage,
            tool = tool.name(),
            exit_code = ?run.exit_code,
            duration_ms = run.duration_ms,
            "tool finished"
        );
        if !run.success {
            let code = run
                .exit_code
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(if run.stderr_tail.is_empty() {
                format!("{} exited with status {code}", tool.name())
            } else {
                format!(
                    "{} exited with status {code}: {}",
                    tool.name(),
                    run.stderr_tail
                )
            });
        }
        if self.store.byte_len(output) == 0 {
            return Err(format!("{} produced no output", tool.name()));
        }
        Ok(())
    }

    /// A tool that died because of SIGINT is a cancellation, not a tool error.
    fn tool_failure(
        &self,
        record: StepRecord,
        stage: ToolStage,
        weekday: WeekdaySelector,
        run: u32,
        date: NaiveDate,
        reason: String,
    ) -> StepError {
        if self.cancel.is_cancelled() {
            return StepError::Fatal(Error::Cancelled);
        }
        StepError::Tool {
            record,
            error: Error::ExternalTool {
                stage,
                weekday,
                run,
                date,
                reason,
            },
        }
    }

    fn finalize(&self, weekday: WeekdaySelector) -> Result<PathBuf> {
        self.store.copy(
            &ArtifactKey::PumpActive { weekday },
            &ArtifactKey::PumpCheckpoint { weekday },
        )?;
        let tuned = ArtifactKey::TunedProfile { weekday };
        self.store
            .copy(&ArtifactKey::WorkingProfile { weekday }, &tuned)?;
        Ok(self.store.path(&tuned))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::{ToolError, ToolRun};
    use std::sync::Mutex;
    use tempfile::tempdir;

    /// Writes a JSON body naming the call into the captured stdout file.
    struct EchoTool {
        name: &'static str,
        fail_on: Option<NaiveDate>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl EchoTool {
        fn new(name: &'static str) -> Self {
            Self {
                name,
                fail_on: None,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl ExternalTool for EchoTool {
        fn name(&self) -> &str {
            self.name
        }

        fn invoke(&self, invocation: &ToolInvocation) -> std::result::Result<ToolRun, ToolError> {
            let args: Vec<String> = invocation
                .args
                .iter()
                .map(|a| a.to_string_lossy().into_owned())
                .collect();
            self.calls.lock().unwrap().push(args.clone());
            let out = invocation.stdout_to.as_ref().unwrap();
            if let Some(date) = self.fail_on {
                if args.iter().any(|a| a.contains(&date.to_string())) {
                    std::fs::write(out, "").unwrap();
                    return Ok(ToolRun {
                        exit_code: Some(1),
                        ..Default::default()
                    });
                }
            }
            let body = format!(
                "{{\"tool\":\"{}\",\"out\":\"{}\"}}",
                self.name,
                out.display()
            );
            std::fs::write(out, &body).unwrap();
            Ok(ToolRun {
                exit_code: Some(0),
                success: true,
                stdout_bytes: body.len() as u64,
                ..Default::default()
            })
        }
    }

    /// Stands in for a tool killed by the same SIGINT that cancelled the run.
    struct InterruptedTool {
        cancel: CancelToken,
    }

    impl ExternalTool for InterruptedTool {
        fn name(&self) -> &str {
            "prep"
        }

        fn invoke(&self, _invocation: &ToolInvocation) -> std::result::Result<ToolRun, ToolError> {
            self.cancel.cancel();
            Ok(ToolRun::default())
        }
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn monday() -> WeekdaySelector {
        WeekdaySelector::new(1).unwrap()
    }

    fn prepared_store(dir: &std::path::Path, dates: &[NaiveDate]) -> ArtifactStore {
        let store = ArtifactStore::new(dir.join("autotune"), dir.join("settings"));
        store.ensure_dirs().unwrap();
        let slot = ArtifactKey::WorkingProfile { weekday: monday() };
        store.write(&ArtifactKey::PumpBaseline, b"{}").unwrap();
        store.write(&slot, b"{\"seed\":true}").unwrap();
        for date in dates {
            store.write(&ArtifactKey::treatments(*date), b"[]").unwrap();
            store.write(&ArtifactKey::entries(*date), b"[]").unwrap();
        }
        store
    }

    fn seed() -> Seed {
        Seed {
            weekday: monday(),
            origin: SeedOrigin::Baseline,
            pump_source: ArtifactKey::PumpBaseline,
        }
    }

    #[test]
    fn transitions_follow_pass_order() {
        let first = ChainState::Pass { run: 1 };
        let second = ChainState::Pass { run: 2 };
        assert!(ChainState::Seeded.can_transition_to(first));
        assert!(!ChainState::Seeded.can_transition_to(second));
        assert!(first.can_transition_to(second));
        assert!(ChainState::Seeded.can_transition_to(ChainState::Finalized));
        let finalized = ChainState::Finalized;
        assert!(!finalized.can_transition_to(ChainState::Aborted));
    }

    #[test]
    fn each_step_feeds_the_next() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02"), day("2023-01-09")];
        let store = prepared_store(dir.path(), &dates);
        let prep = EchoTool::new("prep");
        let core = EchoTool::new("core");
        let cancel = CancelToken::new();

        let scheduler = RunScheduler::new(&prep, &core, &store, &cancel);
        let outcome = scheduler.run(&seed(), &dates, 1);
        assert!(outcome.is_finalized());
        assert_eq!(outcome.steps.len(), 2);

        // The second snapshot is the first step's Core output.
        let second_snapshot = store
            .read_to_string(&ArtifactKey::Snapshot {
                weekday: monday(),
                run: 1,
                date: dates[1],
            })
            .unwrap();
        assert!(second_snapshot.contains("newprofile.1.2023-01-02.json"));

        let tuned = store
            .read_to_string(&ArtifactKey::TunedProfile { weekday: monday() })
            .unwrap();
        assert!(tuned.contains("newprofile.1.2023-01-09.json"));
        let checkpoint = ArtifactKey::PumpCheckpoint { weekday: monday() };
        assert!(store.exists(&checkpoint));
    }

    #[test]
    fn prep_receives_four_paths_in_order() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02")];
        let store = prepared_store(dir.path(), &dates);
        let prep = EchoTool::new("prep");
        let core = EchoTool::new("core");
        let cancel = CancelToken::new();
        let scheduler = RunScheduler::new(&prep, &core, &store, &cancel);
        scheduler.run(&seed(), &dates, 1);

        let calls = prep.calls.lock().unwrap();
        let args = &calls[0];
        assert_eq!(args.len(), 4);
        assert!(args[0].ends_with("ns-treatments.2023-01-02.json"));
        assert!(args[1].ends_with("profile.1.2023-01-02.json"));
        assert!(args[2].ends_with("ns-entries.2023-01-02.json"));
        assert!(args[3].ends_with("profile.pump.active.1.json"));
        let core_calls = core.calls.lock().unwrap();
        assert!(core_calls[0][0].ends_with("autotune.1.2023-01-02.json"));
        assert_eq!(core_calls[0].len(), 3);
    }

    #[test]
    fn fatal_failure_stops_chain_without_finalizing() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02"), day("2023-01-09"), day("2023-01-16")];
        let store = prepared_store(dir.path(), &dates);
        let prep = EchoTool::new("prep");
        let mut core = EchoTool::new("core");
        core.fail_on = Some(day("2023-01-09"));
        let cancel = CancelToken::new();

        let scheduler = RunScheduler::new(&prep, &core, &store, &cancel);
        let outcome = scheduler.run(&seed(), &dates, 1);
        assert_eq!(outcome.state, ChainState::Aborted);
        assert_eq!(outcome.steps.len(), 2);
        match outcome.error {
            Some(Error::ExternalTool { stage, date, run, .. }) => {
                assert_eq!(stage, ToolStage::Core);
                assert_eq!(date, day("2023-01-09"));
                assert_eq!(run, 1);
            }
            ref other => panic!("unexpected: {other:?}"),
        }
        let slot = store
            .read_to_string(&ArtifactKey::WorkingProfile { weekday: monday() })
            .unwrap();
        assert!(slot.contains("newprofile.1.2023-01-02.json"));
        let tuned = ArtifactKey::TunedProfile { weekday: monday() };
        assert!(!store.exists(&tuned));
        assert!(!store.exists(&ArtifactKey::Snapshot {
            weekday: monday(),
            run: 1,
            date: day("2023-01-16")
        }));
    }

    #[test]
    fn warn_policy_skips_failed_step_and_finalizes() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02"), day("2023-01-09"), day("2023-01-16")];
        let store = prepared_store(dir.path(), &dates);
        let mut prep = EchoTool::new("prep");
        prep.fail_on = Some(day("2023-01-09"));
        let core = EchoTool::new("core");
        let cancel = CancelToken::new();

        let outcome = RunScheduler::new(&prep, &core, &store, &cancel)
            .with_policy(ToolFailurePolicy::Warn)
            .run(&seed(), &dates, 1);
        assert!(outcome.is_finalized());
        assert_eq!(outcome.warnings, 1);
        assert_eq!(outcome.advanced_steps(), 2);
        assert_eq!(outcome.steps[1].core, StageStatus::Skipped);
        // Core never ran for the failed date.
        assert_eq!(core.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn cancellation_is_checked_between_steps() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02")];
        let store = prepared_store(dir.path(), &dates);
        let prep = EchoTool::new("prep");
        let core = EchoTool::new("core");
        let cancel = CancelToken::new();
        cancel.cancel();

        let scheduler = RunScheduler::new(&prep, &core, &store, &cancel);
        let outcome = scheduler.run(&seed(), &dates, 1);
        assert!(outcome.was_cancelled());
        assert!(prep.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn tool_killed_by_interrupt_reports_cancellation() {
        let dir = tempdir().unwrap();
        let dates = [day("2023-01-02"), day("2023-01-09")];
        let store = prepared_store(dir.path(), &dates);
        let cancel = CancelToken::new();
        let prep = InterruptedTool {
            cancel: cancel.clone(),
        };
        let core = EchoTool::new("core");

        let scheduler = RunScheduler::new(&prep, &core, &store, &cancel);
        let outcome = scheduler.run(&seed(), &dates, 1);
        assert!(outcome.was_cancelled());
        assert_eq!(outcome.state, ChainState::Aborted);
        assert!(outcome.steps.is_empty());
        assert!(core.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn missing_telemetry_aborts_even_under_warn() {
        let dir = tempdir().unwrap();
        let store = prepared_store(dir.path(), &[]);
        let prep = EchoTool::new("prep");
        let core = EchoTool::new("core");
        let cancel = CancelToken::new();
        let outcome = RunScheduler::new(&prep, &core, &store, &cancel)
            .with_policy(ToolFailurePolicy::Warn)
            .run(&seed(), &[day("2023-01-02")], 1);
        assert!(matches!(outcome.error, Some(Error::MissingArtifact { .. })));
    }

    #[test]
    fn outcome_serializes_error_code() {
        let outcome = WeekdayOutcome::failed_before_chain(monday(), &[], 1, Error::Cancelled);
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["state"], "aborted");
        assert_eq!(json["error"]["code"], 31);
    }
}
