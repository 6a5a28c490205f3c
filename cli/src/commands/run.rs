//! `vouch run <file>`: provision, verify and tear down scenarios.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use vouch_common::{RunSummary, ScenarioOutcome};

use crate::app::{AppContext, collaborators};
use crate::application::ports::ProgressReporter;
use crate::application::services::{ScenarioOrchestrator, ScenarioRunner};
use crate::commands::load_scenarios;
use crate::output::{TerminalReporter, progress};

/// Exit status used when a second interrupt abandons teardown.
const INTERRUPTED_EXIT: i32 = 130;

/// Arguments for the run command.
#[derive(Args)]
pub struct RunArgs {
    /// Scenario file (YAML)
    pub file: PathBuf,

    /// Run only the named scenario (repeatable)
    #[arg(long, value_name = "NAME")]
    pub only: Vec<String>,

    /// Template variable override, applied to every scenario (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Entry point for `vouch run`.
///
/// # Errors
///
/// Returns an error if loading fails or if any scenario does not pass.
pub async fn run(app: &AppContext, args: &RunArgs) -> Result<()> {
    let loaded = load_scenarios(app, &args.file, &args.only, &args.vars)?;
    let scenarios = loaded.scenarios;

    if !app.is_json() {
        app.renderer().render_plan(&scenarios)?;
    }
    let n = scenarios.len();
    let noun = if n == 1 { "instance" } else { "instances" };
    if !app.confirm(
        &format!("Provision {n} cloud {noun}? Resources are billed until torn down"),
        true,
    )? {
        app.output.info("Cancelled.");
        return Ok(());
    }

    let spinner = (!app.is_json() && app.output.show_progress())
        .then(|| progress::spinner(&format!("running {n} scenarios")));
    let reporter: Arc<dyn ProgressReporter> = if app.is_json() {
        Arc::new(TerminalReporter::silent())
    } else {
        let reporter = TerminalReporter::new(&app.output);
        Arc::new(match &spinner {
            Some(pb) => reporter.with_spinner(pb.clone()),
            None => reporter,
        })
    };

    let cancel = CancellationToken::new();
    let interrupts = tokio::spawn(watch_interrupts(cancel.clone(), Arc::clone(&reporter)));

    let orchestrator = ScenarioOrchestrator::new(collaborators(&loaded.config), reporter)
        .with_cancellation(cancel)
        .with_max_concurrent_provisions(loaded.config.runner.max_concurrent_provisions);
    let summary = ScenarioRunner::new(orchestrator).run_all(scenarios).await;

    interrupts.abort();
    if let Some(pb) = spinner {
        pb.finish_and_clear();
    }

    app.renderer().render_summary(&summary)?;
    verdict(&summary)
}

/// First Ctrl-C cancels in-flight scenarios, which still tear down. A
/// second one exits immediately.
async fn watch_interrupts(cancel: CancellationToken, reporter: Arc<dyn ProgressReporter>) {
    if tokio::signal::ctrl_c().await.is_err() {
        return;
    }
    tracing::warn!("interrupt received, cancelling scenarios");
    reporter.warn("interrupted: cancelling scenarios, teardown continues (Ctrl-C again to abort)");
    cancel.cancel();

    if tokio::signal::ctrl_c().await.is_ok() {
        eprintln!("Aborted. Provisioned resources may remain.");
        std::process::exit(INTERRUPTED_EXIT);
    }
}

fn verdict(summary: &RunSummary) -> Result<()> {
    if summary.passed() {
        return Ok(());
    }
    let failing = summary.reports.len() - summary.count(ScenarioOutcome::Pass);
    let leaked: Vec<&str> = summary
        .reports
        .iter()
        .filter(|r| r.teardown.leaked())
        .map(|r| r.scenario.as_str())
        .collect();
    if leaked.is_empty() {
        anyhow::bail!("{failing} of {} scenarios did not pass", summary.reports.len());
    }
    anyhow::bail!(
        "{failing} of {} scenarios did not pass; teardown incomplete for: {}",
        summary.reports.len(),
        leaked.join(", ")
    )
}
