use std::collections::HashMap;
use std::time::Duration;

use super::job::{Outcome, PollConfig};
use super::payload::{JobDocument, PodEntry, StatusPayload};

// Pods of finished jobs report no ready containers.
const FINISHED_PHASES: &[&str] = &["Succeeded", "Completed"];
const WAITING_PHASES: &[&str] = &["Pending", "ContainerCreating", "PodInitializing"];
const CRASH_PHASES: &[&str] = &["CrashLoopBackOff", "Error", "Failed"];

const READY_STATUSES: &[&str] = &["ready", "completed"];
const FAILED_STATUSES: &[&str] = &["failed", "error", "cancelled"];
const PENDING_STATUSES: &[&str] = &["pending", "created"];

/// How long each pod has been in a crash phase, keyed by pod name.
pub type CrashAges = HashMap<String, Duration>;

pub fn is_crash_phase(phase: &str) -> bool {
    CRASH_PHASES.contains(&phase)
}

fn pod_ready(pod: &PodEntry) -> bool {
    FINISHED_PHASES.contains(&pod.phase.as_str())
        || (pod.phase == "Running" && pod.containers_ready())
}

/// Result of classifying one status payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub outcome: Outcome,
    /// Human-readable summary of why.
    pub reason: String,
    /// Entries holding up readiness, by pod name. Empty for job documents.
    pub failing: Vec<String>,
}

impl Classification {
    fn new(outcome: Outcome, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            failing: Vec::new(),
        }
    }

    fn blaming(mut self, failing: Vec<String>) -> Self {
        self.failing = failing;
        self
    }
}

/// Maps a raw payload onto an [`Outcome`].
///
/// Deterministic: the only inputs are the payload and, for pods, how long
/// each one has been crash-looping, which decides whether it is still inside
/// its grace window. A crashing pod missing from `crash_ages` has just started.
#[derive(Debug, Clone)]
pub struct ReadinessClassifier {
    fatal_patterns: Vec<String>,
    crash_grace: Duration,
}

impl Default for ReadinessClassifier {
    fn default() -> Self {
        Self::from_config(&PollConfig::default())
    }
}

impl ReadinessClassifier {
    pub fn new(fatal_patterns: Vec<String>, crash_grace: Duration) -> Self {
        Self {
            fatal_patterns,
            crash_grace,
        }
    }

    pub fn from_config(config: &PollConfig) -> Self {
        Self::new(config.fatal_patterns.clone(), config.crash_grace)
    }

    pub fn classify(&self, payload: &StatusPayload, crash_ages: &CrashAges) -> Classification {
        match payload {
            StatusPayload::Pods { pods } => self.classify_pods(pods, crash_ages),
            StatusPayload::Job { document } => self.classify_document(document),
            StatusPayload::Membership { wanted, available } => {
                if available.iter().any(|a| a == wanted) {
                    Classification::new(Outcome::Ready, format!("{wanted} is available"))
                } else {
                    Classification::new(
                        Outcome::Pending,
                        format!("{wanted} not listed yet ({} available)", available.len()),
                    )
                }
            }
        }
    }

    fn fatal_match(&self, text: &str) -> bool {
        self.fatal_patterns.iter().any(|p| text.contains(p.as_str()))
    }

    fn classify_pods(&self, pods: &[PodEntry], crash_ages: &CrashAges) -> Classification {
        let fatal: Vec<&PodEntry> = pods.iter().filter(|p| self.fatal_match(&p.phase)).collect();
        if !fatal.is_empty() {
            return Classification::new(
                Outcome::FatalError,
                format!("fatal pod status: {}", describe_pods(&fatal)),
            )
            .blaming(names(&fatal));
        }

        if pods.is_empty() {
            return Classification::new(Outcome::Pending, "no pods scheduled yet");
        }

        if pods.iter().all(pod_ready) {
            return Classification::new(Outcome::Ready, format!("{} pods ready", pods.len()));
        }

        let crashing: Vec<&PodEntry> = pods
            .iter()
            .filter(|p| {
                is_crash_phase(&p.phase)
                    && crash_ages
                        .get(&p.name)
                        .is_some_and(|age| *age >= self.crash_grace)
            })
            .collect();
        if !crashing.is_empty() {
            return Classification::new(
                Outcome::Failed,
                format!(
                    "pods failing past {}s grace: {}",
                    self.crash_grace.as_secs(),
                    describe_pods(&crashing)
                ),
            )
            .blaming(names(&crashing));
        }

        let waiting: Vec<&PodEntry> = pods
            .iter()
            .filter(|p| WAITING_PHASES.contains(&p.phase.as_str()) || p.phase.starts_with("Init:"))
            .collect();
        if !waiting.is_empty() {
            return Classification::new(
                Outcome::Pending,
                format!("waiting on {}", describe_pods(&waiting)),
            )
            .blaming(names(&waiting));
        }

        let not_ready: Vec<&PodEntry> = pods
            .iter()
            .filter(|p| !pod_ready(p))
            .collect();
        Classification::new(
            Outcome::Progressing,
            format!("not ready yet: {}", describe_pods(&not_ready)),
        )
        .blaming(names(&not_ready))
    }

    fn classify_document(&self, doc: &JobDocument) -> Classification {
        let fatal: Vec<&str> = doc
            .status_texts()
            .into_iter()
            .filter(|t| self.fatal_match(t))
            .collect();
        if !fatal.is_empty() {
            return Classification::new(
                Outcome::FatalError,
                format!("fatal status: {}", fatal.join("; ")),
            );
        }

        let status = doc.effective_status().map(str::to_lowercase);
        let progress = progress_suffix(doc);

        if let Some(s) = status.as_deref()
            && FAILED_STATUSES.contains(&s)
        {
            let detail = doc
                .error
                .as_deref()
                .or_else(|| doc.status_details.as_ref().and_then(|d| d.message.as_deref()));
            let reason = match detail {
                Some(d) => format!("status {s}: {d}"),
                None => format!("status {s}"),
            };
            return Classification::new(Outcome::Failed, reason);
        }

        let tasks = doc.task_results();
        if tasks.is_some() || doc.results.is_some() {
            let count = tasks.map_or(0, |t| t.len());
            let missing: Vec<&str> = tasks
                .into_iter()
                .flatten()
                .filter(|(_, t)| t.metrics.is_empty())
                .map(|(name, _)| name.as_str())
                .collect();
            if count > 0 && missing.is_empty() {
                return Classification::new(
                    Outcome::Ready,
                    format!("metrics reported for {count} tasks"),
                );
            }

            // A finished job will not grow metrics later.
            let finished = status.as_deref().is_some_and(|s| READY_STATUSES.contains(&s));
            if finished {
                let reason = if missing.is_empty() {
                    "completed without metrics: no tasks reported".to_string()
                } else {
                    format!("completed without metrics for {}", missing.join(", "))
                };
                return Classification::new(Outcome::Failed, reason);
            }
            if !missing.is_empty() {
                return Classification::new(
                    Outcome::Progressing,
                    format!("awaiting metrics for {}", missing.join(", ")),
                );
            }
        }

        if doc.deployed == Some(true) {
            return Classification::new(Outcome::Ready, "deployed");
        }

        match status.as_deref() {
            Some(s) if READY_STATUSES.contains(&s) => {
                Classification::new(Outcome::Ready, format!("status {s}"))
            }
            Some(s) if PENDING_STATUSES.contains(&s) => {
                Classification::new(Outcome::Pending, format!("status {s}{progress}"))
            }
            Some("running") => {
                Classification::new(Outcome::Progressing, format!("status running{progress}"))
            }
            None => Classification::new(Outcome::Progressing, format!("no status yet{progress}")),
            Some(s) => Classification::new(Outcome::Unknown, format!("unrecognised status {s:?}")),
        }
    }
}

fn names(pods: &[&PodEntry]) -> Vec<String> {
    pods.iter().map(|p| p.name.clone()).collect()
}

fn describe_pods(pods: &[&PodEntry]) -> String {
    pods.iter()
        .map(|p| match (p.ready, p.total) {
            (Some(r), Some(t)) => format!("{} ({}, {r}/{t})", p.name, p.phase),
            _ => format!("{} ({})", p.name, p.phase),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn progress_suffix(doc: &JobDocument) -> String {
    let Some(details) = &doc.status_details else {
        return String::new();
    };
    let mut parts = Vec::new();
    if let Some(pct) = details.percentage_done.or(details.progress) {
        parts.push(format!("{pct:.1}% done"));
    }
    if let Some(steps) = details.steps_completed {
        parts.push(format!("{steps} steps"));
    }
    if let Some(epochs) = details.epochs_completed {
        parts.push(format!("{epochs} epochs"));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(", {}", parts.join(", "))
    }
}
