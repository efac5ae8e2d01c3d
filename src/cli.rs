//! Interface de linha de comando do jobwatch baseada em clap.
//!
//! Define a struct [`Cli`] com subcomandos [`Command`] (pods, deployment,
//! customization, evaluation, dataset, model, start, hosts) e flags globais
//! que sobrepõem o arquivo de configuração.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

use crate::lifecycle::{JobKind, PollConfig};

/// Acompanha jobs do NeMo num cluster local até ficarem prontos ou falharem.
#[derive(Debug, Parser)]
#[command(name = "jobwatch", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Caminho do arquivo de configuração (padrão: ./jobwatch.toml).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Intervalo entre consultas, em segundos.
    #[arg(long, global = true)]
    pub interval: Option<u64>,

    /// Tempo máximo de espera, em segundos. `0` desativa o timeout.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Falhas transitórias consecutivas toleradas. `0` desativa o limite.
    #[arg(long, global = true)]
    pub max_retries: Option<u32>,

    /// Habilita saída detalhada (verbose).
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Tipos de job que podem ser criados pela API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StartKind {
    Customization,
    Evaluation,
    Deployment,
}

impl From<StartKind> for JobKind {
    fn from(kind: StartKind) -> Self {
        match kind {
            StartKind::Customization => JobKind::Customization,
            StartKind::Evaluation => JobKind::Evaluation,
            StartKind::Deployment => JobKind::Deployment,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Aguarda todos os pods do namespace ficarem prontos.
    Pods {
        /// Namespace a observar (padrão: k8s_namespace da configuração).
        #[arg(long, short)]
        namespace: Option<String>,

        /// Seletor de labels, ex.: `app=nemo-evaluator`.
        #[arg(long, short = 'l')]
        selector: Option<String>,
    },

    /// Aguarda um model deployment (`namespace/nome`).
    Deployment { target: String },

    /// Aguarda um job de customização.
    Customization { id: String },

    /// Aguarda um job de avaliação e a publicação das métricas.
    Evaluation { id: String },

    /// Aguarda o registro de um dataset (`namespace/nome`).
    Dataset { target: String },

    /// Aguarda um modelo aparecer na listagem do NIM.
    Model { id: String },

    /// Cria um job a partir de um arquivo JSON e acompanha até o fim.
    Start {
        kind: StartKind,

        /// Corpo da requisição de criação, em JSON.
        #[arg(long)]
        file: PathBuf,
    },

    /// Garante entradas no arquivo de hosts para os serviços configurados.
    Hosts {
        /// IP do cluster, ex.: a saída de `minikube ip`.
        #[arg(long)]
        ip: String,

        /// Arquivo de hosts a editar.
        #[arg(long, default_value = "/etc/hosts")]
        file: PathBuf,

        /// Hostnames extras; sem nenhum, usa os hosts das URLs configuradas.
        #[arg(long = "host")]
        hosts: Vec<String>,
    },
}

impl Cli {
    /// Aplica as flags globais sobre a configuração de polling já resolvida.
    pub fn apply_overrides(&self, mut config: PollConfig) -> PollConfig {
        if let Some(interval) = self.interval {
            config.interval = Duration::from_secs(interval);
        }
        if let Some(timeout) = self.timeout {
            config.timeout = (timeout > 0).then(|| Duration::from_secs(timeout));
        }
        if let Some(retries) = self.max_retries {
            config.max_transient_retries = (retries > 0).then_some(retries);
        }
        config
    }
}
