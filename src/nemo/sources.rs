//! Status and diagnostics sources backed by the NeMo API.

use anyhow::bail;

use super::client::NemoClient;
use crate::diagnostics::DiagnosticsSource;
use crate::error::FetchError;
use crate::kube::Kubectl;
use crate::lifecycle::{JobDocument, JobKind, StatusPayload};
use crate::poller::StatusSource;

/// Polls the status endpoint of one customization, evaluation, deployment
/// or dataset job.
pub struct RemoteJobSource {
    client: NemoClient,
    kind: JobKind,
    target: String,
}

impl RemoteJobSource {
    pub fn new(client: NemoClient, kind: JobKind, target: impl Into<String>) -> Self {
        Self {
            client,
            kind,
            target: target.into(),
        }
    }

    async fn evaluation(&self) -> Result<StatusPayload, FetchError> {
        let body = self.client.job_document(JobKind::Evaluation, &self.target).await?;
        let mut document = parse_document(body)?;

        // A completed evaluation only counts once its metrics are readable.
        let completed = document
            .effective_status()
            .is_some_and(|s| s.eq_ignore_ascii_case("completed"));
        if completed {
            let results = self.client.evaluation_results(&self.target).await?;
            document.results = Some(
                serde_json::from_value(results)
                    .map_err(|e| FetchError::Fatal(format!("unexpected results body: {e}")))?,
            );
        }
        Ok(StatusPayload::job(document))
    }
}

impl StatusSource for RemoteJobSource {
    async fn fetch(&mut self) -> Result<StatusPayload, FetchError> {
        match self.kind {
            JobKind::Evaluation => self.evaluation().await,
            JobKind::Customization | JobKind::Deployment => {
                let body = self.client.job_document(self.kind, &self.target).await?;
                StatusPayload::from_json(body)
                    .map_err(|e| FetchError::Fatal(format!("unexpected status body: {e}")))
            }
            JobKind::Dataset => {
                let exists = self.client.dataset_exists(&self.target).await?;
                Ok(StatusPayload::Membership {
                    wanted: self.target.clone(),
                    available: if exists {
                        vec![self.target.clone()]
                    } else {
                        Vec::new()
                    },
                })
            }
            JobKind::Cluster => Err(FetchError::Fatal(
                "cluster readiness is polled through kubectl".into(),
            )),
        }
    }
}

fn parse_document(body: serde_json::Value) -> Result<JobDocument, FetchError> {
    serde_json::from_value(body).map_err(|e| FetchError::Fatal(format!("unexpected status body: {e}")))
}

/// Waits for a model id to appear in the NIM model listing.
pub struct ModelSource {
    client: NemoClient,
    model: String,
}

impl ModelSource {
    pub fn new(client: NemoClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

impl StatusSource for ModelSource {
    async fn fetch(&mut self) -> Result<StatusPayload, FetchError> {
        let available = self.client.served_models().await?;
        Ok(StatusPayload::Membership {
            wanted: self.model.clone(),
            available,
        })
    }
}

/// Post-mortem context for jobs that live behind the NeMo API.
pub struct RemoteDiagnostics {
    client: NemoClient,
    kind: JobKind,
    kubectl: Kubectl,
}

impl RemoteDiagnostics {
    pub fn new(client: NemoClient, kind: JobKind, kubectl: Kubectl) -> Self {
        Self {
            client,
            kind,
            kubectl,
        }
    }
}

impl DiagnosticsSource for RemoteDiagnostics {
    async fn log_tail(&self, entry: &str, lines: u32) -> anyhow::Result<String> {
        if self.kind != JobKind::Customization {
            bail!("{} jobs expose no log endpoint", self.kind);
        }
        let logs = self.client.customization_logs(entry).await?;
        Ok(tail(&logs, lines))
    }

    async fn describe(&self, entry: &str) -> anyhow::Result<String> {
        let body = self.client.job_document(self.kind, entry).await?;
        Ok(serde_json::to_string_pretty(&body)?)
    }

    async fn events(&self) -> anyhow::Result<String> {
        Ok(self.kubectl.recent_events().await?)
    }
}

fn tail(text: &str, lines: u32) -> String {
    let all: Vec<&str> = text.lines().collect();
    let skip = all.len().saturating_sub(lines as usize);
    all[skip..].join("\n")
}
