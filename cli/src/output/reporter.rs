//! `TerminalReporter`: Presentation-layer implementation of `ProgressReporter`.
//!
//! Scenarios run concurrently on the tokio runtime and share one reporter,
//! so it owns its styling state instead of borrowing an `OutputContext`.

use indicatif::ProgressBar;
use owo_colors::OwoColorize as _;

use crate::application::ports::ProgressReporter;
use crate::output::{OutputContext, Styles};

/// Terminal progress reporter.
///
/// - `step()` prints `"  → {message}"`
/// - `success()` prints `"  ✓ {message}"`
/// - `warn()` prints `"  ! {message}"`
///
/// All three are suppressed when quiet. With a spinner attached, lines are
/// printed above it so the spinner stays on the last row.
pub struct TerminalReporter {
    styles: Styles,
    quiet: bool,
    spinner: Option<ProgressBar>,
}

impl TerminalReporter {
    #[must_use]
    pub fn new(ctx: &OutputContext) -> Self {
        Self {
            styles: ctx.styles.clone(),
            quiet: ctx.quiet,
            spinner: None,
        }
    }

    /// A reporter that prints nothing, for `--json` runs.
    #[must_use]
    pub fn silent() -> Self {
        Self {
            styles: Styles::default(),
            quiet: true,
            spinner: None,
        }
    }

    #[must_use]
    pub fn with_spinner(mut self, spinner: ProgressBar) -> Self {
        self.spinner = Some(spinner);
        self
    }

    fn emit(&self, line: &str) {
        if self.quiet {
            return;
        }
        match &self.spinner {
            Some(pb) => pb.println(line),
            None => println!("{line}"),
        }
    }
}

impl ProgressReporter for TerminalReporter {
    fn step(&self, message: &str) {
        self.emit(&format!("  {} {message}", "→".style(self.styles.info)));
    }

    fn success(&self, message: &str) {
        self.emit(&format!("  {} {message}", "✓".style(self.styles.success)));
    }

    fn warn(&self, message: &str) {
        self.emit(&format!("  {} {message}", "!".style(self.styles.warning)));
    }
}
