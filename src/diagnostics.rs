//! Best-effort post-mortem collection after a failed or timed-out poll.
//!
//! Every step runs on its own; a step that fails is logged and recorded in
//! the bundle's `errors`, and the remaining steps still run. Nothing here
//! returns an error to the poller.

use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, warn};

use crate::lifecycle::Job;

pub const DEFAULT_LOG_LINES: u32 = 100;

/// Where supplementary failure context comes from.
#[allow(async_fn_in_trait)]
pub trait DiagnosticsSource {
    /// The last `lines` log lines of a failing entry.
    async fn log_tail(&self, entry: &str, lines: u32) -> anyhow::Result<String>;
    /// Extended description of a failing entry, including its events.
    async fn describe(&self, entry: &str) -> anyhow::Result<String>;
    /// Recent cluster-wide events, oldest first.
    async fn events(&self) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// File name inside the bundle directory.
    pub name: String,
    pub content: String,
}

#[derive(Debug, Default)]
pub struct DiagnosticsBundle {
    /// Directory the sections were written to, if writing succeeded.
    pub dir: Option<PathBuf>,
    pub sections: Vec<Section>,
    /// One line per step that could not be completed.
    pub errors: Vec<String>,
}

impl DiagnosticsBundle {
    #[cfg(test)]
    pub fn section(&self, name: &str) -> Option<&str> {
        self.sections
            .iter()
            .find(|s| s.name == name)
            .map(|s| s.content.as_str())
    }

    fn push(&mut self, name: String, content: String) {
        self.sections.push(Section { name, content });
    }

    fn record_error(&mut self, step: String, error: impl std::fmt::Display) {
        warn!(step = %step, error = %error, "Diagnostics step failed");
        self.errors.push(format!("{step}: {error}"));
    }
}

#[derive(Serialize)]
struct Manifest<'a> {
    job: &'a Job,
    collected_at: chrono::DateTime<Utc>,
    sections: Vec<&'a str>,
    errors: &'a [String],
}

pub struct DiagnosticsCollector<D> {
    source: D,
    sink: Option<PathBuf>,
    log_lines: u32,
}

impl<D: DiagnosticsSource> DiagnosticsCollector<D> {
    /// `sink` is the parent directory for bundles; `None` keeps them in memory.
    pub fn new(source: D, sink: Option<PathBuf>) -> Self {
        Self {
            source,
            sink,
            log_lines: DEFAULT_LOG_LINES,
        }
    }

    pub fn with_log_lines(mut self, lines: u32) -> Self {
        self.log_lines = lines;
        self
    }

    pub async fn collect(&self, job: &Job, failing: &[String]) -> DiagnosticsBundle {
        let mut bundle = DiagnosticsBundle::default();

        for entry in failing {
            let file = file_safe(entry);
            match self.source.log_tail(entry, self.log_lines).await {
                Ok(logs) => bundle.push(format!("{file}.log"), logs),
                Err(e) => bundle.record_error(format!("logs {entry}"), e),
            }
            match self.source.describe(entry).await {
                Ok(text) => bundle.push(format!("{file}.describe.txt"), text),
                Err(e) => bundle.record_error(format!("describe {entry}"), e),
            }
        }

        match self.source.events().await {
            Ok(events) => bundle.push("events.txt".into(), events),
            Err(e) => bundle.record_error("events".into(), e),
        }

        match &job.last_raw_payload {
            Some(raw) => match serde_json::to_string_pretty(raw) {
                Ok(text) => bundle.push("last_status.json".into(), text),
                Err(e) => bundle.record_error("last status".into(), e),
            },
            None => bundle.record_error("last status".into(), "no status was ever fetched"),
        }

        if let Some(sink) = &self.sink {
            let dir = sink.join(format!(
                "{}-{}-{}",
                job.kind,
                file_safe(&job.id),
                Utc::now().format("%Y%m%dT%H%M%SZ")
            ));
            match write_bundle(&dir, job, &mut bundle).await {
                Ok(()) => {
                    debug!(dir = %dir.display(), "Diagnostics bundle written");
                    bundle.dir = Some(dir);
                }
                Err(e) => bundle.record_error(format!("write {}", dir.display()), e),
            }
        }

        bundle
    }
}

async fn write_bundle(dir: &Path, job: &Job, bundle: &mut DiagnosticsBundle) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let mut failed = Vec::new();
    for section in &bundle.sections {
        if let Err(e) = tokio::fs::write(dir.join(&section.name), &section.content).await {
            failed.push((section.name.clone(), e));
        }
    }
    for (name, e) in failed {
        bundle.record_error(format!("write {name}"), e);
    }

    let manifest = Manifest {
        job,
        collected_at: Utc::now(),
        sections: bundle.sections.iter().map(|s| s.name.as_str()).collect(),
        errors: &bundle.errors,
    };
    let json = serde_json::to_string_pretty(&manifest)?;
    tokio::fs::write(dir.join("manifest.json"), json).await
}

// Pod names are already safe; deployment ids carry a slash.
fn file_safe(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') { c } else { '_' })
        .collect()
}
