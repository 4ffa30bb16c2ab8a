//! Telemetry fetching.
//!
//! For each date, two windowed documents are pulled from the remote source
//! and persisted verbatim: carb/insulin treatments and glucose entries. The
//! bodies are never parsed here.

pub mod retry;
pub mod source;

pub use retry::{plan_retry, FailureKind, RetryDecision, RetryPolicy};
pub use source::{NightscoutClient, SourceError, TelemetryQuery, TelemetrySource};

use crate::cancel::CancelToken;
use crate::store::ArtifactStore;
use at_common::{ArtifactKey, Error, Result, TelemetryStream};
use at_config::AutotuneConfig;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Paths of the two artifacts persisted for one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryPair {
    pub date: NaiveDate,
    pub treatments: PathBuf,
    pub entries: PathBuf,
    /// Both artifacts were already on disk and the network was skipped.
    pub reused: bool,
}

pub struct TelemetryFetcher<'a> {
    source: &'a dyn TelemetrySource,
    store: &'a ArtifactStore,
    host: String,
    token: Option<String>,
    entries_count: u32,
    reuse_existing: bool,
    retry: RetryPolicy,
}

impl<'a> TelemetryFetcher<'a> {
    pub fn new(
        source: &'a dyn TelemetrySource,
        store: &'a ArtifactStore,
        config: &AutotuneConfig,
    ) -> Self {
        Self {
            source,
            store,
            host: config.ns_host.clone(),
            token: config.user_token.clone(),
            entries_count: config.fetch.entries_count,
            reuse_existing: config.fetch.reuse_existing,
            retry: RetryPolicy::from_settings(&config.fetch),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Fetch and persist both streams for one date.
    pub fn fetch(&self, date: NaiveDate) -> Result<TelemetryPair> {
        let treatments_key = ArtifactKey::treatments(date);
        let entries_key = ArtifactKey::entries(date);
        let on_disk = self.store.exists(&treatments_key) && self.store.exists(&entries_key);
        if self.reuse_existing && on_disk {
            debug!(%date, "reusing telemetry already on disk");
            return Ok(TelemetryPair {
                date,
                treatments: self.store.path(&treatments_key),
                entries: self.store.path(&entries_key),
                reused: true,
            });
        }

        let treatments = self.fetch_stream(TelemetryStream::Treatments, date)?;
        let entries = self.fetch_stream(TelemetryStream::Entries, date)?;
        Ok(TelemetryPair {
            date,
            treatments,
            entries,
            reused: false,
        })
    }

    /// Fetch every date in order, stopping at the first failure.
    pub fn fetch_all(
        &self,
        dates: &[NaiveDate],
        cancel: &CancelToken,
    ) -> Result<Vec<TelemetryPair>> {
        let mut pairs = Vec::with_capacity(dates.len());
        for date in dates {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            pairs.push(self.fetch(*date)?);
        }
        Ok(pairs)
    }

    fn fetch_stream(&self, stream: TelemetryStream, date: NaiveDate) -> Result<PathBuf> {
        let query = TelemetryQuery::for_date(
            stream,
            date,
            self.entries_count,
            self.token.as_deref(),
        );
        info!(
            %stream,
            %date,
            url = %query.redacted_url(&self.host),
            "fetching telemetry"
        );

        let mut attempt = 0;
        loop {
            match self.source.get(&query) {
                Ok(body) => {
                    let key = ArtifactKey::telemetry(stream, date);
                    let path = self.store.write(&key, body.as_bytes())?;
                    debug!(
                        %stream,
                        %date,
                        bytes = body.len(),
                        path = %path.display(),
                        "telemetry saved"
                    );
                    return Ok(path);
                }
                Err(err) => {
                    let decision = plan_retry(&err, attempt, &self.retry);
                    match (decision.kind, decision.delay_ms) {
                        (FailureKind::Transient, Some(delay_ms)) => {
                            warn!(
                                %stream,
                                %date,
                                attempt = attempt + 1,
                                attempts_left = decision.attempts_left,
                                delay_ms,
                                error = %err,
                                "telemetry fetch failed, retrying"
                            );
                            std::thread::sleep(Duration::from_millis(delay_ms));
                            attempt += 1;
                        }
                        _ => {
                            return Err(Error::TelemetryFetch {
                                date,
                                stream,
                                cause: if attempt > 0 {
                                    format!("{err} (after {} attempts)", attempt + 1)
                                } else {
                                    err.to_string()
                                },
                            });
                        }
                    }
                }
            }
        }
    }
}
