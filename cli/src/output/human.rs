//! Human-readable terminal renderer.

use owo_colors::OwoColorize as _;
use owo_colors::Style;
use vouch_common::{
    ExpectationResult, ProbeOutcome, ProbeResult, RunSummary, ScenarioOutcome, ScenarioReport,
    TeardownStatus,
};

use crate::domain::{Scenario, SuiteKind};
use crate::output::{OutputContext, Styles};

/// Longest slice of observed output echoed under a non-passing probe.
const OUTPUT_PREVIEW_CHARS: usize = 160;

/// Renders reports and listings as human-readable terminal output using `OutputContext`.
pub struct HumanRenderer<'a> {
    ctx: &'a OutputContext,
}

impl<'a> HumanRenderer<'a> {
    /// Create a new `HumanRenderer` wrapping the given output context.
    #[must_use]
    pub fn new(ctx: &'a OutputContext) -> Self {
        Self { ctx }
    }

    /// Render the CLI version information.
    pub fn render_version(&self, version: &str) {
        if self.ctx.quiet {
            return;
        }
        println!("vouch {version}");
    }

    /// Render the standard suites and their probes.
    pub fn render_suites(&self) {
        if self.ctx.quiet {
            return;
        }
        for kind in SuiteKind::ALL {
            let suite = kind.suite();
            println!();
            println!(
                "  {}  {}",
                kind.name().style(self.ctx.styles.header),
                kind.summary().style(self.ctx.styles.dim)
            );
            for probe in &suite.probes {
                println!("    {:<26} {}", probe.name, probe.description);
            }
        }
        println!();
    }

    /// Render what a validated scenario file would run.
    pub fn render_plan(&self, scenarios: &[Scenario]) {
        if self.ctx.quiet {
            return;
        }
        for scenario in scenarios {
            println!();
            println!("  {}", scenario.name.style(self.ctx.styles.header));
            self.ctx.kv(
                "  template:   ",
                &scenario.template.working_dir().display().to_string(),
            );
            let suites: Vec<String> = scenario
                .suites
                .iter()
                .map(|s| format!("{} ({})", s.name, s.len()))
                .collect();
            self.ctx.kv("  suites:     ", &suites.join(", "));
            self.ctx.kv(
                "  expects:    ",
                &format!(
                    "{} tags, {} outputs",
                    scenario.expect.tags.len(),
                    scenario.expect.outputs.len()
                ),
            );
            self.ctx.kv(
                "  readiness:  ",
                &format!(
                    "{} x {}s ({})",
                    scenario.readiness.max_attempts,
                    scenario.readiness.interval_secs,
                    scenario.readiness.command
                ),
            );
        }
        println!();
    }

    /// Render every scenario report followed by run totals.
    pub fn render_summary(&self, summary: &RunSummary) {
        for report in &summary.reports {
            self.render_report(report);
        }
        if self.ctx.quiet {
            return;
        }
        println!();
        let line = format_totals(summary);
        if summary.passed() {
            println!("  {} {line}", "✓".style(self.ctx.styles.success));
        } else {
            println!("  {} {line}", "✗".style(self.ctx.styles.error));
        }
        println!();
    }

    fn render_report(&self, report: &ScenarioReport) {
        let lines = self.report_lines(report);
        if lines.is_empty() {
            return;
        }
        println!();
        for line in lines {
            println!("{line}");
        }
    }

    /// Lines describing one scenario report. Empty when quiet hides it;
    /// non-passing scenarios are shown even when quiet.
    pub(crate) fn report_lines(&self, report: &ScenarioReport) -> Vec<String> {
        if self.ctx.quiet && report.passed() {
            return Vec::new();
        }
        let styles = &self.ctx.styles;
        let symbol = scenario_symbol(report.outcome);
        let mut lines = vec![format!(
            "  {} {}  {}",
            symbol.style(scenario_style(styles, report.outcome)),
            report.scenario.style(styles.header),
            format!(
                "{} in {}",
                report.outcome.label(),
                format_duration(report.duration_ms)
            )
            .style(styles.dim)
        )];

        if let Some(id) = &report.metadata.instance_id {
            let address = report.metadata.address.as_deref().unwrap_or("-");
            lines.push(format!("    {}", format!("{id} @ {address}").style(styles.dim)));
        }
        if let Some(error) = &report.error {
            lines.push(format!("    {} {error}", "error:".style(styles.error)));
        }

        if !report.expectations.is_empty() {
            lines.push(format!("    {}", "metadata".style(styles.bold)));
            for result in &report.expectations {
                lines.push(self.expectation_line(result));
            }
        }

        for suite in &report.suites {
            lines.push(format!(
                "    {} {}",
                suite.name.style(styles.bold),
                format!(
                    "{}/{} passed",
                    suite.count(ProbeOutcome::Pass),
                    suite.results.len()
                )
                .style(styles.dim)
            ));
            for result in &suite.results {
                self.push_probe_lines(&mut lines, result);
            }
        }

        let teardown = teardown_display(&report.teardown);
        if report.teardown.leaked() {
            lines.push(format!("    {} {teardown}", "teardown:".style(styles.error)));
        } else {
            lines.push(format!(
                "    {}",
                format!("teardown: {teardown}").style(styles.dim)
            ));
        }
        lines
    }

    fn expectation_line(&self, result: &ExpectationResult) -> String {
        let symbol = outcome_symbol(result.outcome);
        let symbol = symbol.style(outcome_style(&self.ctx.styles, result.outcome));
        match &result.detail {
            Some(detail) => format!("      {symbol} {:<28} {detail}", result.subject),
            None => format!("      {symbol} {}", result.subject),
        }
    }

    fn push_probe_lines(&self, lines: &mut Vec<String>, result: &ProbeResult) {
        let styles = &self.ctx.styles;
        let symbol = outcome_symbol(result.outcome);
        let symbol = symbol.style(outcome_style(styles, result.outcome));
        if result.outcome.is_pass() {
            lines.push(format!("      {symbol} {}", result.probe));
            return;
        }
        let detail = result.detail.as_deref().unwrap_or("");
        lines.push(format!("      {symbol} {:<28} {detail}", result.probe));
        let preview = preview_output(&result.output);
        if !preview.is_empty() {
            lines.push(format!("          {}", preview.style(styles.dim)));
        }
    }
}

// ── Display helpers (used by tests and output layer) ─────────────────────────

#[must_use]
pub fn outcome_symbol(outcome: ProbeOutcome) -> &'static str {
    match outcome {
        ProbeOutcome::Pass => "✓",
        ProbeOutcome::Fail => "✗",
        ProbeOutcome::Error => "!",
    }
}

fn outcome_style(styles: &Styles, outcome: ProbeOutcome) -> Style {
    match outcome {
        ProbeOutcome::Pass => styles.success,
        ProbeOutcome::Fail => styles.warning,
        ProbeOutcome::Error => styles.error,
    }
}

#[must_use]
pub fn scenario_symbol(outcome: ScenarioOutcome) -> &'static str {
    match outcome {
        ScenarioOutcome::Pass => "✓",
        ScenarioOutcome::Fail => "✗",
        ScenarioOutcome::Failed => "!",
    }
}

fn scenario_style(styles: &Styles, outcome: ScenarioOutcome) -> Style {
    match outcome {
        ScenarioOutcome::Pass => styles.success,
        ScenarioOutcome::Fail => styles.warning,
        ScenarioOutcome::Failed => styles.error,
    }
}

#[must_use]
pub fn teardown_display(status: &TeardownStatus) -> String {
    match status {
        TeardownStatus::NotRequired => "not required".to_string(),
        TeardownStatus::Completed => "completed".to_string(),
        TeardownStatus::Failed { error } => format!("FAILED, resources may remain: {error}"),
        TeardownStatus::Unknown => "unknown, resources may remain".to_string(),
    }
}

#[must_use]
pub fn format_duration(ms: u64) -> String {
    let secs = ms / 1000;
    match (secs / 60, secs % 60) {
        (0, 0) => format!("{ms}ms"),
        (0, s) => format!("{s}s"),
        (m, s) => format!("{m}m {s}s"),
    }
}

#[must_use]
pub fn format_totals(summary: &RunSummary) -> String {
    let total = summary.reports.len();
    let noun = if total == 1 { "scenario" } else { "scenarios" };
    format!(
        "{total} {noun}: {} passed, {} failed verification, {} did not complete",
        summary.count(ScenarioOutcome::Pass),
        summary.count(ScenarioOutcome::Fail),
        summary.count(ScenarioOutcome::Failed),
    )
}

/// First non-empty line of `output`, truncated.
#[must_use]
pub fn preview_output(output: &str) -> String {
    let line = output.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    if line.chars().count() > OUTPUT_PREVIEW_CHARS {
        let cut: String = line.chars().take(OUTPUT_PREVIEW_CHARS).collect();
        format!("{cut}…")
    } else {
        line.to_string()
    }
}
