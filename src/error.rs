use thiserror::Error;

use crate::kube::KubeError;
use crate::nemo::NemoError;

#[derive(Debug, Error)]
pub enum JobwatchError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Job creation response carried no id: {0}")]
    MissingJobId(String),

    #[error("NeMo API error: {0}")]
    Nemo(#[from] NemoError),

    #[error("kubectl error: {0}")]
    Kube(#[from] KubeError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

/// Why one status fetch produced no payload.
///
/// The poller retries `Transient` up to its configured cap and stops on `Fatal`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network hiccup, 5xx, or a resource that does not exist yet.
    #[error("transient: {0}")]
    Transient(String),
    /// The endpoint rejected the request in a way retrying cannot fix.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl From<NemoError> for FetchError {
    fn from(err: NemoError) -> Self {
        if err.is_transient() {
            FetchError::Transient(err.to_string())
        } else {
            FetchError::Fatal(err.to_string())
        }
    }
}

impl From<KubeError> for FetchError {
    fn from(err: KubeError) -> Self {
        match err {
            // A missing kubectl binary will not appear between ticks.
            KubeError::Spawn(_) => FetchError::Fatal(err.to_string()),
            _ => FetchError::Transient(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_display() {
        let err = FetchError::Transient("connection refused".into());
        assert_eq!(err.to_string(), "transient: connection refused");
        let err = FetchError::Fatal("401 unauthorized".into());
        assert_eq!(err.to_string(), "fatal: 401 unauthorized");
    }

    #[test]
    fn nemo_errors_split_by_retryability() {
        let not_found = NemoError::ApiError {
            status: 404,
            message: "no such job".into(),
        };
        assert!(matches!(FetchError::from(not_found), FetchError::Transient(_)));

        let bad_request = NemoError::ApiError {
            status: 422,
            message: "invalid".into(),
        };
        assert!(matches!(FetchError::from(bad_request), FetchError::Fatal(_)));
    }

    #[test]
    fn kubectl_failures_are_transient_unless_missing() {
        let exit = KubeError::Command {
            args: "get pods".into(),
            stderr: "Unable to connect to the server".into(),
        };
        assert!(matches!(FetchError::from(exit), FetchError::Transient(_)));

        let spawn = KubeError::Spawn("No such file or directory".into());
        assert!(matches!(FetchError::from(spawn), FetchError::Fatal(_)));
    }

    #[test]
    fn missing_kubectl_surfaces_as_jobwatch_error() {
        let err = JobwatchError::from(KubeError::Spawn("No such file or directory".into()));
        assert!(matches!(err, JobwatchError::Kube(KubeError::Spawn(_))));
        assert_eq!(
            err.to_string(),
            "kubectl error: failed to run kubectl: No such file or directory"
        );
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<JobwatchError>();
        assert_send_sync::<FetchError>();
    }
}
