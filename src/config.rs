//! Configuração do jobwatch carregada a partir de `jobwatch.toml`.
//!
//! A struct [`JobwatchConfig`] contém todos os parâmetros configuráveis.
//! Valores não presentes no arquivo usam defaults sensíveis.
//! As variáveis de ambiente `NEMO_URL`, `NIM_URL` e `NDS_URL` têm precedência
//! sobre o arquivo; flags da CLI têm precedência sobre ambos.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::JobwatchError;
use crate::lifecycle::{DEFAULT_FATAL_PATTERNS, JobKind, PollConfig};
use crate::provision::host_of;

const DEFAULT_CONFIG_FILE: &str = "jobwatch.toml";

/// Configuração de nível superior carregada de `jobwatch.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct JobwatchConfig {
    /// URL base das APIs da plataforma (entity store, customizer, evaluator).
    #[serde(default = "default_nemo_url")]
    pub nemo_url: String,

    /// URL base do gateway de inferência NIM.
    #[serde(default = "default_nim_url")]
    pub nim_url: String,

    /// URL base do data store.
    #[serde(default = "default_nds_url")]
    pub nds_url: String,

    /// Namespace Kubernetes onde os pods são observados.
    #[serde(default = "default_namespace")]
    pub k8s_namespace: String,

    /// Contexto do kubeconfig; `None` usa o contexto atual.
    #[serde(default)]
    pub kube_context: Option<String>,

    /// Diretório onde os pacotes de diagnóstico são gravados.
    #[serde(default = "default_diagnostics_dir")]
    pub diagnostics_dir: PathBuf,

    /// Linhas de log coletadas por entrada com falha.
    #[serde(default = "default_log_lines")]
    pub log_lines: u32,

    /// Falhas transitórias consecutivas toleradas. `0` desativa o limite.
    #[serde(default = "default_max_transient_retries")]
    pub max_transient_retries: u32,

    /// Janela de tolerância, em segundos, para pods em CrashLoopBackOff.
    #[serde(default = "default_crash_grace_secs")]
    pub crash_grace_secs: u64,

    /// Substrings de status que abortam o polling imediatamente.
    #[serde(default = "default_fatal_patterns")]
    pub fatal_patterns: Vec<String>,

    /// Intervalo e timeout por tipo de job.
    #[serde(default)]
    pub poll: PollProfiles,
}

/// Perfis de polling por tipo de job; campos ausentes usam os defaults do tipo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollProfiles {
    #[serde(default)]
    pub cluster: PollProfile,
    #[serde(default)]
    pub deployment: PollProfile,
    #[serde(default)]
    pub evaluation: PollProfile,
    #[serde(default)]
    pub customization: PollProfile,
    #[serde(default)]
    pub dataset: PollProfile,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollProfile {
    pub interval_secs: Option<u64>,
    /// `0` significa sem timeout.
    pub timeout_secs: Option<u64>,
}

impl PollProfiles {
    fn get(&self, kind: JobKind) -> &PollProfile {
        match kind {
            JobKind::Cluster => &self.cluster,
            JobKind::Deployment => &self.deployment,
            JobKind::Evaluation => &self.evaluation,
            JobKind::Customization => &self.customization,
            JobKind::Dataset => &self.dataset,
        }
    }
}

fn default_nemo_url() -> String {
    "http://nemo.test".to_string()
}

fn default_nim_url() -> String {
    "http://nim.test".to_string()
}

fn default_nds_url() -> String {
    "http://data-store.test".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_diagnostics_dir() -> PathBuf {
    PathBuf::from("diagnostics")
}

fn default_log_lines() -> u32 {
    100
}

fn default_max_transient_retries() -> u32 {
    5
}

fn default_crash_grace_secs() -> u64 {
    60
}

fn default_fatal_patterns() -> Vec<String> {
    DEFAULT_FATAL_PATTERNS.iter().map(|p| p.to_string()).collect()
}

impl Default for JobwatchConfig {
    fn default() -> Self {
        Self {
            nemo_url: default_nemo_url(),
            nim_url: default_nim_url(),
            nds_url: default_nds_url(),
            k8s_namespace: default_namespace(),
            kube_context: None,
            diagnostics_dir: default_diagnostics_dir(),
            log_lines: default_log_lines(),
            max_transient_retries: default_max_transient_retries(),
            crash_grace_secs: default_crash_grace_secs(),
            fatal_patterns: default_fatal_patterns(),
            poll: PollProfiles::default(),
        }
    }
}

impl JobwatchConfig {
    /// Carrega a configuração de `path`, ou de `jobwatch.toml` no diretório atual.
    /// Um caminho explícito precisa existir; o arquivo padrão é opcional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => Self::from_file(p)?,
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str::<JobwatchConfig>(&contents)
            .map_err(JobwatchError::from)
            .with_context(|| format!("invalid config in {}", path.display()))?;
        Ok(config)
    }

    // Variáveis de ambiente vazias são ignoradas.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides: [(&str, &mut String); 3] = [
            ("NEMO_URL", &mut self.nemo_url),
            ("NIM_URL", &mut self.nim_url),
            ("NDS_URL", &mut self.nds_url),
        ];
        for (key, field) in overrides {
            if let Some(value) = lookup(key)
                && !value.is_empty()
            {
                *field = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), JobwatchError> {
        for url in [&self.nemo_url, &self.nim_url, &self.nds_url] {
            host_of(url)?;
        }
        if self.k8s_namespace.trim().is_empty() {
            return Err(JobwatchError::Config("k8s_namespace must not be empty".into()));
        }
        Ok(())
    }

    /// Monta o [`PollConfig`] de um tipo de job a partir dos defaults e do arquivo.
    pub fn poll_config(&self, kind: JobKind) -> PollConfig {
        let mut config = PollConfig::for_kind(kind);
        let profile = self.poll.get(kind);
        if let Some(interval) = profile.interval_secs {
            config.interval = Duration::from_secs(interval);
        }
        if let Some(timeout) = profile.timeout_secs {
            config.timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
        }
        config.fatal_patterns = self.fatal_patterns.clone();
        config.max_transient_retries =
            (self.max_transient_retries > 0).then_some(self.max_transient_retries);
        config.crash_grace = Duration::from_secs(self.crash_grace_secs);
        config
    }

    /// Hostnames dos serviços, usados para provisionar o arquivo de hosts.
    pub fn service_hosts(&self) -> Result<Vec<String>, JobwatchError> {
        let mut hosts = Vec::new();
        for url in [&self.nemo_url, &self.nim_url, &self.nds_url] {
            let host = host_of(url)?;
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn default_config_values() {
        let config = JobwatchConfig::default();
        assert_eq!(config.nemo_url, "http://nemo.test");
        assert_eq!(config.nim_url, "http://nim.test");
        assert_eq!(config.k8s_namespace, "default");
        assert_eq!(config.max_transient_retries, 5);
        assert_eq!(config.crash_grace_secs, 60);
        assert!(config.kube_context.is_none());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            nemo_url = "http://nemo.example:8080"
            max_transient_retries = 0

            [poll.deployment]
            interval_secs = 30
        "#;
        let config: JobwatchConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.nemo_url, "http://nemo.example:8080");
        assert_eq!(config.nim_url, "http://nim.test");

        let deployment = config.poll_config(JobKind::Deployment);
        assert_eq!(deployment.interval, Duration::from_secs(30));
        // Timeout ausente mantém o default do tipo.
        assert_eq!(deployment.timeout, Some(Duration::from_secs(900)));
        assert_eq!(deployment.max_transient_retries, None);
    }

    #[test]
    fn zero_timeout_means_unbounded() {
        let config: JobwatchConfig = toml::from_str(
            r#"
            [poll.cluster]
            timeout_secs = 0
        "#,
        )
        .unwrap();
        assert!(config.poll_config(JobKind::Cluster).timeout.is_none());
        assert_eq!(
            config.poll_config(JobKind::Cluster).interval,
            Duration::from_secs(15)
        );
    }

    #[test]
    fn poll_config_carries_global_settings() {
        let config: JobwatchConfig = toml::from_str(
            r#"
            crash_grace_secs = 90
            fatal_patterns = ["ImagePullBackOff", "InvalidImageName"]
        "#,
        )
        .unwrap();
        let poll = config.poll_config(JobKind::Evaluation);
        assert_eq!(poll.crash_grace, Duration::from_secs(90));
        assert_eq!(poll.fatal_patterns, vec!["ImagePullBackOff", "InvalidImageName"]);
        assert_eq!(poll.max_transient_retries, Some(5));
        assert!(poll.timeout.is_none());
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = JobwatchConfig::default();
        let env: HashMap<&str, &str> =
            HashMap::from([("NEMO_URL", "http://10.0.0.2"), ("NIM_URL", "")]);
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(config.nemo_url, "http://10.0.0.2");
        assert_eq!(config.nim_url, "http://nim.test");
    }

    #[test]
    fn explicit_path_must_exist() {
        let tmp = TempDir::new().unwrap();
        assert!(JobwatchConfig::load(Some(&tmp.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn load_from_explicit_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jobwatch.toml");
        std::fs::write(&path, "k8s_namespace = \"nemo\"\nlog_lines = 50\n").unwrap();
        let config = JobwatchConfig::load(Some(&path)).unwrap();
        assert_eq!(config.k8s_namespace, "nemo");
        assert_eq!(config.log_lines, 50);
    }

    #[test]
    fn invalid_url_fails_validation() {
        let config = JobwatchConfig {
            nim_url: "nim.test".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(JobwatchError::Config(_))));
    }

    #[test]
    fn service_hosts_are_deduplicated() {
        let config = JobwatchConfig {
            nds_url: "http://nemo.test/datastore".into(),
            ..Default::default()
        };
        assert_eq!(config.service_hosts().unwrap(), vec!["nemo.test", "nim.test"]);
    }
}
