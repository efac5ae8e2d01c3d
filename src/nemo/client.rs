use std::time::Duration;

use reqwest::{Client, Response};
use serde_json::Value;

use super::error::NemoError;
use super::types::{ModelList, split_target};
use crate::lifecycle::JobKind;

#[derive(Debug, Clone)]
pub struct NemoClient {
    client: Client,
    nemo_url: String,
    nim_url: String,
}

impl NemoClient {
    /// `nemo_url` serves the platform APIs, `nim_url` the inference gateway.
    pub fn new(nemo_url: &str, nim_url: &str) -> Result<Self, NemoError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(30))
            .build()?;
        Ok(Self {
            client,
            nemo_url: nemo_url.trim_end_matches('/').to_string(),
            nim_url: nim_url.trim_end_matches('/').to_string(),
        })
    }

    /// Collection path a job kind is created under.
    fn collection(kind: JobKind) -> Option<&'static str> {
        match kind {
            JobKind::Customization => Some("/v1/customization/jobs"),
            JobKind::Evaluation => Some("/v1/evaluation/jobs"),
            JobKind::Deployment => Some("/v1/deployment/model-deployments"),
            JobKind::Dataset => Some("/v1/datasets"),
            JobKind::Cluster => None,
        }
    }

    fn resource_url(&self, kind: JobKind, id: &str) -> Result<String, NemoError> {
        let collection = Self::collection(kind).ok_or_else(|| NemoError::ApiError {
            status: 400,
            message: format!("{kind} jobs have no NeMo endpoint"),
        })?;
        match kind {
            JobKind::Deployment | JobKind::Dataset => {
                let (namespace, name) = split_target(id).ok_or_else(|| NemoError::ApiError {
                    status: 400,
                    message: format!("expected namespace/name, got {id:?}"),
                })?;
                Ok(format!("{}{collection}/{namespace}/{name}", self.nemo_url))
            }
            _ => Ok(format!("{}{collection}/{id}", self.nemo_url)),
        }
    }

    async fn read_json(response: Response) -> Result<Value, NemoError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(NemoError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| NemoError::ParseError(e.to_string()))
    }

    async fn get_json(&self, url: &str) -> Result<Value, NemoError> {
        let response = self.client.get(url).send().await?;
        Self::read_json(response).await
    }

    /// Submits a creation request and returns the response body.
    pub async fn create(&self, kind: JobKind, body: &Value) -> Result<Value, NemoError> {
        let collection = Self::collection(kind).ok_or_else(|| NemoError::ApiError {
            status: 400,
            message: format!("{kind} jobs cannot be created through the API"),
        })?;
        let url = format!("{}{collection}", self.nemo_url);
        let response = self.client.post(&url).json(body).send().await?;
        Self::read_json(response).await
    }

    /// The status document of a customization, evaluation or deployment job.
    pub async fn job_document(&self, kind: JobKind, id: &str) -> Result<Value, NemoError> {
        let url = self.resource_url(kind, id)?;
        self.get_json(&url).await
    }

    pub async fn evaluation_results(&self, id: &str) -> Result<Value, NemoError> {
        let url = format!("{}/v1/evaluation/jobs/{id}/results", self.nemo_url);
        self.get_json(&url).await
    }

    /// Whether the entity store knows `namespace/name` yet.
    pub async fn dataset_exists(&self, target: &str) -> Result<bool, NemoError> {
        match self.job_document(JobKind::Dataset, target).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Model ids currently served by NIM.
    pub async fn served_models(&self) -> Result<Vec<String>, NemoError> {
        let body = self.get_json(&format!("{}/v1/models", self.nim_url)).await?;
        let list: ModelList =
            serde_json::from_value(body).map_err(|e| NemoError::ParseError(e.to_string()))?;
        Ok(list.ids())
    }

    /// Training container logs of a customization job.
    pub async fn customization_logs(&self, id: &str) -> Result<String, NemoError> {
        let url = format!("{}/v1/customization/jobs/{id}/container-logs", self.nemo_url);
        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(NemoError::ApiError {
                status: status.as_u16(),
                message: text,
            });
        }
        Ok(text)
    }
}
