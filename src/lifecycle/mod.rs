mod classify;
mod job;
mod payload;

pub use classify::{CrashAges, ReadinessClassifier, is_crash_phase};
pub use job::{DEFAULT_FATAL_PATTERNS, Job, JobKind, Outcome, PollConfig};
pub use payload::{JobDocument, PodEntry, StatusPayload};
