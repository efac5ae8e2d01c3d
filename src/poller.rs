//! The poll loop: fetch, classify, sleep, repeat until a terminal outcome.
//!
//! [`JobPoller`] owns timing, the transient-retry cap, cancellation and the
//! hand-off to [`DiagnosticsCollector`] on failure. Whatever it is fed, it
//! returns exactly one terminal [`Outcome`] in its [`PollReport`].

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::diagnostics::{DiagnosticsBundle, DiagnosticsCollector, DiagnosticsSource};
use crate::error::FetchError;
use crate::lifecycle::{
    CrashAges, Job, JobKind, Outcome, PollConfig, ReadinessClassifier, StatusPayload,
    is_crash_phase,
};

pub const CANCELLED_REASON: &str = "cancelled by operator";

/// Anything that can report the current status of a job.
#[allow(async_fn_in_trait)]
pub trait StatusSource {
    async fn fetch(&mut self) -> Result<StatusPayload, FetchError>;
}

/// Progress of one classified tick, handed to the caller's callback.
#[derive(Debug, Clone)]
pub struct Tick {
    pub number: u32,
    pub elapsed: Duration,
    pub outcome: Outcome,
    pub reason: String,
}

/// What a finished poll loop reports back.
#[derive(Debug)]
pub struct PollReport {
    pub outcome: Outcome,
    pub reason: String,
    pub ticks: u32,
    pub elapsed: Duration,
    pub diagnostics: Option<DiagnosticsBundle>,
}

/// When each pod was first seen crash-looping. A pod that leaves the crash
/// phases is forgotten, so its grace window restarts on the next crash.
#[derive(Debug, Default)]
struct CrashTracker {
    since: HashMap<String, Instant>,
}

impl CrashTracker {
    fn observe(&mut self, payload: &StatusPayload, now: Instant) -> CrashAges {
        let StatusPayload::Pods { pods } = payload else {
            return CrashAges::new();
        };
        let crashing: HashSet<&str> = pods
            .iter()
            .filter(|p| is_crash_phase(&p.phase))
            .map(|p| p.name.as_str())
            .collect();
        self.since.retain(|name, _| crashing.contains(name.as_str()));
        for name in crashing {
            self.since.entry(name.to_string()).or_insert(now);
        }
        self.since
            .iter()
            .map(|(name, first)| (name.clone(), now.duration_since(*first)))
            .collect()
    }
}

pub struct JobPoller<D> {
    config: PollConfig,
    classifier: ReadinessClassifier,
    diagnostics: DiagnosticsCollector<D>,
    cancel: CancellationToken,
}

impl<D: DiagnosticsSource> JobPoller<D> {
    pub fn new(
        config: PollConfig,
        classifier: ReadinessClassifier,
        diagnostics: DiagnosticsCollector<D>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            config,
            classifier,
            diagnostics,
            cancel,
        }
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Poll `source` until the job reaches a terminal outcome.
    ///
    /// `on_tick` runs after every successful classification. Transient fetch
    /// failures are logged, not reported through it.
    pub async fn run<S: StatusSource>(
        &self,
        job: &mut Job,
        source: &mut S,
        mut on_tick: impl FnMut(&Tick),
    ) -> PollReport {
        let start = Instant::now();
        let mut ticks = 0u32;
        let mut consecutive_failures = 0u32;
        let mut last_reason = String::from("no status fetched yet");
        let mut last_failing: Vec<String> = Vec::new();
        let mut crashes = CrashTracker::default();

        let (outcome, reason, failing) = loop {
            if self.cancel.is_cancelled() {
                break (Outcome::Failed, CANCELLED_REASON.to_string(), last_failing);
            }

            ticks += 1;
            let fetched = source.fetch().await;
            let elapsed = start.elapsed();

            match fetched {
                Ok(payload) => {
                    consecutive_failures = 0;
                    job.last_raw_payload = Some(payload.to_json());
                    let crash_ages = crashes.observe(&payload, Instant::now());
                    let classification = self.classifier.classify(&payload, &crash_ages);
                    job.last_status = Some(classification.outcome);
                    log_tick(job, ticks, elapsed, classification.outcome, &classification.reason);
                    on_tick(&Tick {
                        number: ticks,
                        elapsed,
                        outcome: classification.outcome,
                        reason: classification.reason.clone(),
                    });

                    if classification.outcome.is_terminal() {
                        break (
                            classification.outcome,
                            classification.reason,
                            classification.failing,
                        );
                    }
                    last_reason = classification.reason;
                    last_failing = classification.failing;
                }
                Err(FetchError::Transient(message)) => {
                    consecutive_failures += 1;
                    warn!(
                        job_id = %job.id,
                        kind = %job.kind,
                        tick = ticks,
                        attempt = consecutive_failures,
                        error = %message,
                        "Failed to get status, retrying"
                    );
                    if let Some(max) = self.config.max_transient_retries
                        && consecutive_failures > max
                    {
                        break (
                            Outcome::FatalError,
                            format!(
                                "status fetch failed {consecutive_failures} times in a row: {message}"
                            ),
                            last_failing,
                        );
                    }
                    last_reason = message;
                }
                Err(FetchError::Fatal(message)) => {
                    break (Outcome::FatalError, message, last_failing);
                }
            }

            if let Some(timeout) = self.config.timeout
                && elapsed >= timeout
            {
                break (
                    Outcome::TimedOut,
                    format!(
                        "not ready after {}s (last: {last_reason})",
                        elapsed.as_secs()
                    ),
                    last_failing,
                );
            }

            let cancelled = tokio::select! {
                _ = self.cancel.cancelled() => true,
                _ = sleep(self.config.interval) => false,
            };
            if cancelled {
                break (Outcome::Failed, CANCELLED_REASON.to_string(), last_failing);
            }
        };

        if outcome != Outcome::Ready {
            job.last_status = Some(outcome);
        }

        let diagnostics = if outcome.is_failure() {
            let failing = if failing.is_empty() && job.kind != JobKind::Cluster {
                vec![job.id.clone()]
            } else {
                failing
            };
            Some(self.diagnostics.collect(job, &failing).await)
        } else {
            None
        };

        let elapsed = start.elapsed();
        if outcome == Outcome::Ready {
            info!(
                job_id = %job.id,
                kind = %job.kind,
                outcome = %outcome,
                ticks,
                elapsed_secs = elapsed.as_secs(),
                "Poll finished"
            );
        } else {
            warn!(
                job_id = %job.id,
                kind = %job.kind,
                outcome = %outcome,
                ticks,
                elapsed_secs = elapsed.as_secs(),
                reason = %reason,
                diagnostics = ?diagnostics.as_ref().and_then(|d| d.dir.as_ref()),
                "Poll finished"
            );
        }

        PollReport {
            outcome,
            reason,
            ticks,
            elapsed,
            diagnostics,
        }
    }
}

fn log_tick(job: &Job, tick: u32, elapsed: Duration, outcome: Outcome, reason: &str) {
    if outcome == Outcome::Unknown {
        warn!(
            job_id = %job.id,
            kind = %job.kind,
            tick,
            elapsed_secs = elapsed.as_secs(),
            "Unrecognised status, still polling: {reason}"
        );
    } else {
        info!(
            job_id = %job.id,
            kind = %job.kind,
            tick,
            outcome = %outcome,
            elapsed_secs = elapsed.as_secs(),
            "{reason}"
        );
    }
}
