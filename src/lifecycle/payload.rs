//! Raw status payloads as fetched from the cluster or the NeMo API.
//!
//! [`StatusPayload`] is what a status source hands to the classifier. The
//! job document keeps every field it does not model in `extra` so the raw
//! payload written into a diagnostics bundle is the one the API returned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One status observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StatusPayload {
    /// Pods in the watched namespace.
    Pods { pods: Vec<PodEntry> },
    /// Body of a job-style endpoint (customization, evaluation, deployment).
    Job { document: JobDocument },
    /// Whether an item has shown up in a listing yet.
    Membership {
        wanted: String,
        available: Vec<String>,
    },
}

impl StatusPayload {
    pub fn pods(pods: Vec<PodEntry>) -> Self {
        StatusPayload::Pods { pods }
    }

    pub fn job(document: JobDocument) -> Self {
        StatusPayload::Job { document }
    }

    /// Parses a JSON body into a job payload.
    pub fn from_json(value: Value) -> serde_json::Result<Self> {
        Ok(StatusPayload::Job {
            document: serde_json::from_value(value)?,
        })
    }

    /// JSON form kept on the job for diagnostics.
    pub fn to_json(&self) -> Value {
        match self {
            StatusPayload::Job { document } => {
                serde_json::to_value(document).unwrap_or(Value::Null)
            }
            other => serde_json::to_value(other).unwrap_or(Value::Null),
        }
    }
}

/// A pod as `kubectl get pods` would print it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PodEntry {
    pub name: String,
    /// Display status: `Running`, `Pending`, `Init:0/1`, `CrashLoopBackOff`, ...
    pub phase: String,
    pub ready: Option<u32>,
    pub total: Option<u32>,
}

impl PodEntry {
    pub fn new(name: impl Into<String>, phase: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            phase: phase.into(),
            ready: None,
            total: None,
        }
    }

    pub fn with_containers(mut self, ready: u32, total: u32) -> Self {
        self.ready = Some(ready);
        self.total = Some(total);
        self
    }

    /// True unless counts are known and differ.
    pub fn containers_ready(&self) -> bool {
        match (self.ready, self.total) {
            (Some(ready), Some(total)) => ready == total,
            _ => true,
        }
    }
}

/// Job-style status body. Every field is optional because the endpoints
/// disagree on shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDocument {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<BTreeMap<String, TaskResult>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub results: Option<ResultsBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobDocument {
    /// Top-level status, falling back to `status_details.status`.
    pub fn effective_status(&self) -> Option<&str> {
        self.status.as_deref().or_else(|| {
            self.status_details
                .as_ref()
                .and_then(|d| d.status.as_deref())
        })
    }

    /// Evaluation tasks, either top level or nested under `results`.
    pub fn task_results(&self) -> Option<&BTreeMap<String, TaskResult>> {
        self.tasks
            .as_ref()
            .or_else(|| self.results.as_ref().and_then(|r| r.tasks.as_ref()))
    }

    /// Every free-text field a fatal pattern could appear in.
    pub fn status_texts(&self) -> Vec<&str> {
        let mut texts = Vec::new();
        texts.extend(self.status.as_deref());
        if let Some(details) = &self.status_details {
            texts.extend(details.status.as_deref());
            texts.extend(details.message.as_deref());
        }
        texts.extend(self.error.as_deref());
        texts
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_done: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub steps_completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub epochs_completed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultsBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<BTreeMap<String, TaskResult>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    #[serde(default)]
    pub metrics: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_document_from_customizer_body() {
        let body = json!({
            "id": "cust-abc",
            "status": "running",
            "status_details": {"percentage_done": 42.5, "steps_completed": 120},
            "output_model": "ns/model@v1"
        });
        let doc: JobDocument = serde_json::from_value(body).unwrap();
        assert_eq!(doc.effective_status(), Some("running"));
        let details = doc.status_details.as_ref().unwrap();
        assert_eq!(details.percentage_done, Some(42.5));
        assert_eq!(details.steps_completed, Some(120));
        assert_eq!(doc.extra["output_model"], "ns/model@v1");
    }

    #[test]
    fn null_status_is_none() {
        let doc: JobDocument = serde_json::from_value(json!({"status": null})).unwrap();
        assert!(doc.status.is_none());
    }

    #[test]
    fn effective_status_falls_back_to_details() {
        let doc: JobDocument = serde_json::from_value(json!({
            "deployed": false,
            "status_details": {"status": "pending"}
        }))
        .unwrap();
        assert_eq!(doc.effective_status(), Some("pending"));
    }

    #[test]
    fn task_results_top_level_or_nested() {
        let top: JobDocument =
            serde_json::from_value(json!({"tasks": {"t1": {"metrics": {"bleu": {}}}}})).unwrap();
        assert!(top.task_results().unwrap()["t1"].metrics.contains_key("bleu"));

        let nested: JobDocument = serde_json::from_value(json!({
            "results": {"tasks": {"t2": {"metrics": {}}}}
        }))
        .unwrap();
        assert!(nested.task_results().unwrap()["t2"].metrics.is_empty());
    }

    #[test]
    fn raw_payload_keeps_unmodelled_fields() {
        let body = json!({"status": "failed", "namespace": "default", "error": "OOM"});
        let payload = StatusPayload::from_json(body).unwrap();
        let raw = payload.to_json();
        assert_eq!(raw["namespace"], "default");
        assert_eq!(raw["error"], "OOM");
    }

    #[test]
    fn pod_container_readiness() {
        assert!(PodEntry::new("a", "Running").containers_ready());
        assert!(PodEntry::new("a", "Running").with_containers(2, 2).containers_ready());
        assert!(!PodEntry::new("a", "Running").with_containers(1, 2).containers_ready());
    }
}
