use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The kind of remote work a job represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobKind {
    Cluster,
    Deployment,
    Evaluation,
    Customization,
    Dataset,
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKind::Cluster => write!(f, "cluster"),
            JobKind::Deployment => write!(f, "deployment"),
            JobKind::Evaluation => write!(f, "evaluation"),
            JobKind::Customization => write!(f, "customization"),
            JobKind::Dataset => write!(f, "dataset"),
        }
    }
}

/// Lifecycle state of a job at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Pending,
    Progressing,
    /// Status value nobody recognised. Polled like `Progressing`.
    Unknown,
    Ready,
    Failed,
    TimedOut,
    FatalError,
}

impl Outcome {
    /// Whether the poll loop stops on this outcome.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Outcome::Ready | Outcome::Failed | Outcome::TimedOut | Outcome::FatalError
        )
    }

    /// Terminal outcomes other than `Ready`.
    pub fn is_failure(self) -> bool {
        self.is_terminal() && self != Outcome::Ready
    }

    /// Process exit code for a CLI wrapping the poller.
    pub fn exit_code(self) -> i32 {
        match self {
            Outcome::Ready => 0,
            Outcome::Failed => 1,
            Outcome::TimedOut => 2,
            // Non-terminal outcomes never leave the poller; map them with fatal.
            Outcome::FatalError | Outcome::Pending | Outcome::Progressing | Outcome::Unknown => 3,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Pending => write!(f, "PENDING"),
            Outcome::Progressing => write!(f, "PROGRESSING"),
            Outcome::Unknown => write!(f, "UNKNOWN"),
            Outcome::Ready => write!(f, "READY"),
            Outcome::Failed => write!(f, "FAILED"),
            Outcome::TimedOut => write!(f, "TIMED_OUT"),
            Outcome::FatalError => write!(f, "FATAL_ERROR"),
        }
    }
}

/// Settings for one polling loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollConfig {
    /// Fixed delay between ticks.
    pub interval: Duration,
    /// Wall-clock budget from loop start. `None` polls until cancelled.
    pub timeout: Option<Duration>,
    /// Substrings that abort polling as soon as they show up in a status.
    pub fatal_patterns: Vec<String>,
    /// Consecutive transient fetch failures tolerated. `None` retries forever.
    pub max_transient_retries: Option<u32>,
    /// How long a crash-looping pod is tolerated before it counts as failed.
    pub crash_grace: Duration,
}

pub const DEFAULT_FATAL_PATTERNS: &[&str] = &["ImagePullBackOff", "ErrImagePull"];

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            timeout: None,
            fatal_patterns: DEFAULT_FATAL_PATTERNS.iter().map(|p| p.to_string()).collect(),
            max_transient_retries: Some(5),
            crash_grace: Duration::from_secs(60),
        }
    }
}

impl PollConfig {
    /// Interval and timeout defaults for each kind of job.
    pub fn for_kind(kind: JobKind) -> Self {
        let (interval, timeout) = match kind {
            JobKind::Cluster => (15, Some(1800)),
            JobKind::Deployment => (10, Some(900)),
            JobKind::Evaluation => (10, None),
            JobKind::Customization => (10, None),
            JobKind::Dataset => (5, None),
        };
        Self {
            interval: Duration::from_secs(interval),
            timeout: timeout.map(Duration::from_secs),
            ..Default::default()
        }
    }
}

/// One asynchronous unit of remote work being watched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub kind: JobKind,
    pub started_at: DateTime<Utc>,
    pub last_status: Option<Outcome>,
    /// Last raw status response, kept only for diagnostics.
    pub last_raw_payload: Option<serde_json::Value>,
}

impl Job {
    pub fn new(id: impl Into<String>, kind: JobKind) -> Self {
        Self {
            id: id.into(),
            kind,
            started_at: Utc::now(),
            last_status: None,
            last_raw_payload: None,
        }
    }

    /// A job with no remote identifier, such as cluster bring-up.
    pub fn local(kind: JobKind) -> Self {
        Self::new(Uuid::new_v4().to_string(), kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn job_creation_defaults() {
        let job = Job::new("cust-123", JobKind::Customization);
        assert_eq!(job.id, "cust-123");
        assert_eq!(job.kind, JobKind::Customization);
        assert!(job.last_status.is_none());
        assert!(job.last_raw_payload.is_none());
    }

    #[test]
    fn local_job_gets_uuid() {
        let a = Job::local(JobKind::Cluster);
        let b = Job::local(JobKind::Cluster);
        assert_eq!(a.id.len(), 36);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn terminal_outcomes() {
        assert!(Outcome::Ready.is_terminal());
        assert!(Outcome::Failed.is_terminal());
        assert!(Outcome::TimedOut.is_terminal());
        assert!(Outcome::FatalError.is_terminal());
        assert!(!Outcome::Pending.is_terminal());
        assert!(!Outcome::Progressing.is_terminal());
        assert!(!Outcome::Unknown.is_terminal());
        assert!(!Outcome::Ready.is_failure());
        assert!(Outcome::TimedOut.is_failure());
    }

    #[test]
    fn exit_codes() {
        assert_eq!(Outcome::Ready.exit_code(), 0);
        assert_eq!(Outcome::Failed.exit_code(), 1);
        assert_eq!(Outcome::TimedOut.exit_code(), 2);
        assert_eq!(Outcome::FatalError.exit_code(), 3);
    }

    #[test]
    fn per_kind_poll_defaults() {
        let cluster = PollConfig::for_kind(JobKind::Cluster);
        assert_eq!(cluster.interval, Duration::from_secs(15));
        assert_eq!(cluster.timeout, Some(Duration::from_secs(1800)));

        let deployment = PollConfig::for_kind(JobKind::Deployment);
        assert_eq!(deployment.timeout, Some(Duration::from_secs(900)));

        let dataset = PollConfig::for_kind(JobKind::Dataset);
        assert_eq!(dataset.interval, Duration::from_secs(5));
        assert!(dataset.timeout.is_none());
        assert_eq!(dataset.crash_grace, Duration::from_secs(60));
        assert_eq!(dataset.fatal_patterns, vec!["ImagePullBackOff", "ErrImagePull"]);
    }

    #[test]
    fn kind_display_matches_serde() {
        let json = serde_json::to_string(&JobKind::Evaluation).unwrap();
        assert_eq!(json, "\"evaluation\"");
        assert_eq!(JobKind::Evaluation.to_string(), "evaluation");
    }
}
