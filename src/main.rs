mod cli;
mod config;
mod diagnostics;
mod error;
mod kube;
mod lifecycle;
mod nemo;
mod poller;
mod provision;
mod ui;

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use console::Style;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Command};
use config::JobwatchConfig;
use diagnostics::{DiagnosticsCollector, DiagnosticsSource};
use error::JobwatchError;
use kube::Kubectl;
use lifecycle::{Job, JobKind, Outcome, ReadinessClassifier};
use nemo::types::created_job_id;
use nemo::{ModelSource, NemoClient, RemoteDiagnostics, RemoteJobSource};
use poller::{JobPoller, StatusSource};
use ui::JobProgress;

/// Usage errors share the exit code of fatal errors.
const EXIT_FATAL: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(EXIT_FATAL)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current tick");
            interrupt.cancel();
        }
    });

    match run(cli, cancel).await {
        Ok(outcome) => ExitCode::from(u8::try_from(outcome.exit_code()).unwrap_or(EXIT_FATAL)),
        Err(e) => {
            eprintln!("{} {e:#}", Style::new().red().bold().apply_to("error:"));
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("jobwatch=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("jobwatch=warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Everything a single invocation needs to build a poller.
struct Session {
    cli: Cli,
    config: JobwatchConfig,
    cancel: CancellationToken,
}

impl Session {
    fn kubectl(&self) -> Kubectl {
        Kubectl::new(&self.config.k8s_namespace).with_context(self.config.kube_context.clone())
    }

    fn nemo(&self) -> Result<NemoClient, JobwatchError> {
        Ok(NemoClient::new(&self.config.nemo_url, &self.config.nim_url)?)
    }

    async fn watch<S, D>(&self, job: &mut Job, source: &mut S, diagnostics: D) -> Outcome
    where
        S: StatusSource,
        D: DiagnosticsSource,
    {
        let config = self.cli.apply_overrides(self.config.poll_config(job.kind));
        let collector =
            DiagnosticsCollector::new(diagnostics, Some(self.config.diagnostics_dir.clone()))
                .with_log_lines(self.config.log_lines);
        let poller = JobPoller::new(
            config.clone(),
            ReadinessClassifier::from_config(&config),
            collector,
            self.cancel.clone(),
        );
        info!(
            kind = %job.kind,
            id = %job.id,
            interval_secs = poller.config().interval.as_secs(),
            timeout_secs = ?poller.config().timeout.map(|t| t.as_secs()),
            "Polling started"
        );

        let mut progress = JobProgress::start(job);
        let report = poller.run(job, source, |tick| progress.tick(tick)).await;
        progress.complete(&report);
        report.outcome
    }

    async fn watch_remote(&self, kind: JobKind, target: &str) -> anyhow::Result<Outcome> {
        let nemo = self.nemo()?;
        let mut job = Job::new(target, kind);
        let mut source = RemoteJobSource::new(nemo.clone(), kind, target);
        let diagnostics = RemoteDiagnostics::new(nemo, kind, self.kubectl());
        Ok(self.watch(&mut job, &mut source, diagnostics).await)
    }
}

async fn run(cli: Cli, cancel: CancellationToken) -> anyhow::Result<Outcome> {
    let config = JobwatchConfig::load(cli.config.as_deref())?;
    let session = Session {
        cli,
        config,
        cancel,
    };

    match &session.cli.command {
        Command::Hosts { ip, file, hosts } => {
            let hosts = if hosts.is_empty() {
                session.config.service_hosts()?
            } else {
                hosts.clone()
            };
            let change = provision::ensure_hosts(file, ip, &hosts)
                .with_context(|| format!("failed to update {}", file.display()))?;
            ui::print_hosts_change(&change);
            Ok(Outcome::Ready)
        }
        Command::Pods {
            namespace,
            selector,
        } => {
            let kubectl = match namespace {
                Some(ns) => Kubectl::new(ns).with_context(session.config.kube_context.clone()),
                None => session.kubectl(),
            }
            .with_selector(selector.clone());
            kubectl
                .ensure_available()
                .await
                .map_err(JobwatchError::from)?;
            debug!(namespace = kubectl.namespace(), "Watching pods");

            let mut job = Job::local(JobKind::Cluster);
            let mut source = kubectl.clone();
            Ok(session.watch(&mut job, &mut source, kubectl).await)
        }
        Command::Deployment { target } => session.watch_remote(JobKind::Deployment, target).await,
        Command::Customization { id } => session.watch_remote(JobKind::Customization, id).await,
        Command::Evaluation { id } => session.watch_remote(JobKind::Evaluation, id).await,
        Command::Dataset { target } => session.watch_remote(JobKind::Dataset, target).await,
        Command::Model { id } => {
            let nemo = session.nemo()?;
            let mut job = Job::new(id, JobKind::Deployment);
            let mut source = ModelSource::new(nemo.clone(), id);
            let diagnostics = RemoteDiagnostics::new(nemo, JobKind::Deployment, session.kubectl());
            Ok(session.watch(&mut job, &mut source, diagnostics).await)
        }
        Command::Start { kind, file } => {
            let kind = JobKind::from(*kind);
            let raw = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let request: serde_json::Value = serde_json::from_str(&raw)
                .map_err(JobwatchError::from)
                .with_context(|| format!("invalid request in {}", file.display()))?;

            let response = session.nemo()?.create(kind, &request).await?;
            let id = created_job_id(kind, &response)
                .ok_or_else(|| JobwatchError::MissingJobId(response.to_string()))?;
            info!(%kind, id = %id, "Job created");
            session.watch_remote(kind, &id).await
        }
    }
}
