//! Suite execution.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use vouch_common::{ProbeResult, SuiteReport};

use crate::application::ports::ProgressReporter;
use crate::application::services::probe_runner::ProbeRunner;
use crate::domain::{ProbeSuite, Target};

/// Run every probe in `suite`, in order, exactly once.
///
/// A failing or erroring probe never stops the suite, so the result count
/// always equals the probe count.
pub async fn run_all(
    suite: &ProbeSuite,
    target: &Target,
    runner: &ProbeRunner,
) -> Vec<ProbeResult> {
    let mut results = Vec::with_capacity(suite.len());
    for probe in &suite.probes {
        results.push(runner.run(target, probe).await);
    }
    results
}

/// [`run_all`] with progress output, packaged as a report.
pub async fn run_suite(
    suite: &ProbeSuite,
    target: &Target,
    runner: &ProbeRunner,
    reporter: &dyn ProgressReporter,
    scenario: &str,
) -> SuiteReport {
    reporter.step(&format!("{scenario}: running {} suite...", suite.name));
    let results = run_all(suite, target, runner).await;
    let report = SuiteReport {
        name: suite.name.clone(),
        results,
    };
    if report.passed() {
        reporter.success(&format!(
            "{scenario}: {} suite passed ({} probes)",
            suite.name,
            report.results.len()
        ));
    } else {
        let failing: Vec<_> = report
            .results
            .iter()
            .filter(|r| !r.outcome.is_pass())
            .map(|r| format!("{} ({})", r.probe, r.outcome.label()))
            .collect();
        reporter.warn(&format!(
            "{scenario}: {} suite: {}",
            suite.name,
            failing.join(", ")
        ));
    }
    report
}
