//! Interface de terminal do jobwatch: spinner e saída colorida.
//!
//! Usa as crates `indicatif` para o spinner de progresso e `console` para
//! estilização com cores. O [`JobProgress`] acompanha visualmente o polling
//! de um job no terminal.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::lifecycle::{Job, Outcome};
use crate::poller::{PollReport, Tick};
use crate::provision::HostsChange;

/// Indicador visual de progresso para o polling de um job.
///
/// O spinner mostra o tick mais recente; cada mudança de outcome fica
/// registrada numa linha própria. Sucesso aparece em verde, falha em
/// vermelho e avisos em amarelo.
pub struct JobProgress {
    pb: ProgressBar,
    label: String,
    // Último outcome exibido, para imprimir apenas transições.
    last: Option<Outcome>,
    green: Style,
    red: Style,
    yellow: Style,
}

impl JobProgress {
    /// Inicia o spinner para o job informado.
    pub fn start(job: &Job) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{elapsed}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        let label = format!("{} {}", job.kind, job.id);
        pb.set_message(format!("{label}: waiting for first status"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            label,
            last: None,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
        }
    }

    /// Atualiza o spinner com o resultado de um tick.
    pub fn tick(&mut self, tick: &Tick) {
        if self.last != Some(tick.outcome) {
            self.pb.println(format!(
                "  {} {} after {}s: {}",
                self.yellow.apply_to("•"),
                tick.outcome,
                tick.elapsed.as_secs(),
                tick.reason
            ));
            self.last = Some(tick.outcome);
        }
        self.pb.set_message(format!(
            "{}: tick {} {} ({})",
            self.label, tick.number, tick.outcome, tick.reason
        ));
    }

    /// Finaliza o spinner e exibe o resultado final do polling.
    ///
    /// Em caso de falha, mostra também onde o pacote de diagnóstico foi gravado.
    pub fn complete(&self, report: &PollReport) {
        self.pb.finish_and_clear();
        let secs = report.elapsed.as_secs();
        if report.outcome == Outcome::Ready {
            println!(
                "  {} {} ready after {secs}s ({} ticks)",
                self.green.apply_to("✓"),
                self.label,
                report.ticks
            );
            return;
        }

        println!(
            "  {} {} {} after {secs}s: {}",
            self.red.apply_to("✗"),
            self.label,
            report.outcome,
            report.reason
        );
        if let Some(bundle) = &report.diagnostics {
            match &bundle.dir {
                Some(dir) => println!("    diagnostics: {}", dir.display()),
                None => println!(
                    "    {} diagnostics were not written to disk",
                    self.yellow.apply_to("!")
                ),
            }
            for error in &bundle.errors {
                println!("    {} {error}", self.yellow.apply_to("!"));
            }
        }
    }
}

/// Resume as alterações feitas no arquivo de hosts.
pub fn print_hosts_change(change: &HostsChange) {
    let green = Style::new().green().bold();
    if change.is_empty() {
        println!("  {} hosts file already up to date", green.apply_to("✓"));
        return;
    }
    for name in &change.added {
        println!("  {} added {name}", green.apply_to("+"));
    }
    for name in &change.moved {
        println!("  {} moved {name}", Style::new().yellow().apply_to("↻"));
    }
}
