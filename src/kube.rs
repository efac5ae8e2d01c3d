//! kubectl-backed access to the local cluster.
//!
//! [`Kubectl`] shells out to the `kubectl` binary with `tokio::process` and
//! turns `get pods -o json` into the display statuses the classifier
//! understands.

use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::diagnostics::DiagnosticsSource;
use crate::error::FetchError;
use crate::lifecycle::{PodEntry, StatusPayload};
use crate::poller::StatusSource;

#[derive(Debug, Error)]
pub enum KubeError {
    /// The binary could not be started at all.
    #[error("failed to run kubectl: {0}")]
    Spawn(String),

    #[error("kubectl {args} failed: {stderr}")]
    Command { args: String, stderr: String },

    #[error("failed to parse kubectl output: {0}")]
    Parse(String),
}

#[derive(Debug, Clone)]
pub struct Kubectl {
    namespace: String,
    context: Option<String>,
    selector: Option<String>,
}

impl Kubectl {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            context: None,
            selector: None,
        }
    }

    pub fn with_context(mut self, context: Option<String>) -> Self {
        self.context = context;
        self
    }

    /// Restrict pod listing to a label selector such as `app=nemo-evaluator`.
    pub fn with_selector(mut self, selector: Option<String>) -> Self {
        self.selector = selector;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn command(&self, namespaced: bool) -> Command {
        let mut cmd = Command::new("kubectl");
        if let Some(context) = &self.context {
            cmd.arg("--context").arg(context);
        }
        if namespaced {
            cmd.arg("-n").arg(&self.namespace);
        }
        cmd
    }

    async fn run(&self, namespaced: bool, args: &[&str]) -> Result<String, KubeError> {
        let mut cmd = self.command(namespaced);
        cmd.args(args);
        debug!(command = ?cmd, "Running kubectl");

        let output = cmd
            .output()
            .await
            .map_err(|e| KubeError::Spawn(e.to_string()))?;

        if !output.status.success() {
            return Err(KubeError::Command {
                args: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Fails early when kubectl is missing from `PATH`.
    pub async fn ensure_available(&self) -> Result<(), KubeError> {
        self.run(false, &["version", "--client"]).await.map(|_| ())
    }

    pub async fn list_pods(&self) -> Result<Vec<PodEntry>, KubeError> {
        let mut args = vec!["get", "pods", "-o", "json"];
        if let Some(selector) = &self.selector {
            args.push("-l");
            args.push(selector);
        }
        let json = self.run(true, &args).await?;
        parse_pod_list(&json)
    }

    pub async fn logs(&self, pod: &str, lines: u32) -> Result<String, KubeError> {
        let tail = format!("--tail={lines}");
        self.run(true, &["logs", pod, "--all-containers=true", &tail])
            .await
    }

    pub async fn describe_pod(&self, pod: &str) -> Result<String, KubeError> {
        self.run(true, &["describe", "pod", pod]).await
    }

    pub async fn recent_events(&self) -> Result<String, KubeError> {
        self.run(
            false,
            &["get", "events", "--all-namespaces", "--sort-by=.lastTimestamp"],
        )
        .await
    }
}

impl StatusSource for Kubectl {
    async fn fetch(&mut self) -> Result<StatusPayload, FetchError> {
        Ok(StatusPayload::pods(self.list_pods().await?))
    }
}

impl DiagnosticsSource for Kubectl {
    async fn log_tail(&self, entry: &str, lines: u32) -> anyhow::Result<String> {
        Ok(self.logs(entry, lines).await?)
    }

    async fn describe(&self, entry: &str) -> anyhow::Result<String> {
        Ok(self.describe_pod(entry).await?)
    }

    async fn events(&self) -> anyhow::Result<String> {
        Ok(self.recent_events().await?)
    }
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Pod {
    metadata: PodMetadata,
    #[serde(default)]
    spec: PodSpec,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodMetadata {
    name: String,
    #[serde(default)]
    deletion_timestamp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PodSpec {
    #[serde(default)]
    containers: Vec<serde::de::IgnoredAny>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    #[serde(default)]
    phase: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    init_container_statuses: Vec<ContainerStatus>,
    #[serde(default)]
    container_statuses: Vec<ContainerStatus>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatus {
    #[serde(default)]
    ready: bool,
    #[serde(default)]
    state: ContainerState,
}

#[derive(Debug, Default, Deserialize)]
struct ContainerState {
    #[serde(default)]
    waiting: Option<StateReason>,
    #[serde(default)]
    terminated: Option<Terminated>,
}

#[derive(Debug, Deserialize)]
struct StateReason {
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Terminated {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    exit_code: i32,
}

fn parse_pod_list(json: &str) -> Result<Vec<PodEntry>, KubeError> {
    let list: PodList = serde_json::from_str(json).map_err(|e| KubeError::Parse(e.to_string()))?;
    Ok(list.items.iter().map(pod_entry).collect())
}

/// Derives the STATUS column `kubectl get pods` would print.
fn pod_entry(pod: &Pod) -> PodEntry {
    let status = &pod.status;
    let total = if pod.spec.containers.is_empty() {
        status.container_statuses.len()
    } else {
        pod.spec.containers.len()
    };
    let ready = status.container_statuses.iter().filter(|c| c.ready).count();

    let mut phase = status
        .reason
        .clone()
        .or_else(|| status.phase.clone())
        .unwrap_or_else(|| "Unknown".to_string());

    let init_total = status.init_container_statuses.len();
    let mut initializing = false;
    for (i, init) in status.init_container_statuses.iter().enumerate() {
        if let Some(t) = &init.state.terminated {
            if t.exit_code == 0 {
                continue;
            }
            phase = format!("Init:{}", t.reason.as_deref().unwrap_or("Error"));
        } else if let Some(reason) = init.state.waiting.as_ref().and_then(|w| w.reason.as_deref())
            && reason != "PodInitializing"
        {
            phase = format!("Init:{reason}");
        } else {
            phase = format!("Init:{i}/{init_total}");
        }
        initializing = true;
        break;
    }

    if !initializing {
        for container in status.container_statuses.iter().rev() {
            if let Some(reason) = container.state.waiting.as_ref().and_then(|w| w.reason.as_deref()) {
                phase = reason.to_string();
            } else if let Some(reason) = container.state.terminated.as_ref().and_then(|t| t.reason.as_deref()) {
                phase = reason.to_string();
            }
        }
    }

    if pod.metadata.deletion_timestamp.is_some() {
        phase = "Terminating".to_string();
    }

    PodEntry::new(&pod.metadata.name, phase).with_containers(ready as u32, total as u32)
}
