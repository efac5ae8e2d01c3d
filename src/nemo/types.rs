//! Wire shapes for the NeMo endpoints this tool reads beyond job documents.

use serde::Deserialize;
use serde_json::Value;

use crate::lifecycle::JobKind;

/// Body of `GET {nim}/v1/models`.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelRef {
    pub id: String,
}

impl ModelList {
    pub fn ids(self) -> Vec<String> {
        self.data.into_iter().map(|m| m.id).collect()
    }
}

/// Identifier a creation response assigns to the new job.
///
/// Customization and evaluation jobs return an `id`; model deployments are
/// addressed by `namespace/name`; datasets the same way.
pub fn created_job_id(kind: JobKind, body: &Value) -> Option<String> {
    match kind {
        JobKind::Deployment | JobKind::Dataset => {
            let namespace = body.get("namespace")?.as_str()?;
            let name = body.get("name")?.as_str()?;
            Some(format!("{namespace}/{name}"))
        }
        JobKind::Customization | JobKind::Evaluation | JobKind::Cluster => {
            body.get("id")?.as_str().map(str::to_string)
        }
    }
}

/// Splits a `namespace/name` target.
pub fn split_target(target: &str) -> Option<(&str, &str)> {
    let (namespace, name) = target.split_once('/')?;
    if namespace.is_empty() || name.is_empty() {
        return None;
    }
    Some((namespace, name))
}
