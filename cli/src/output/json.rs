//! JSON output helpers.
//!
//! Every `--json` code path prints exactly one pretty-printed document to
//! stdout. Failures print the error object from [`format_error`] to stderr.

use anyhow::{Context, Result};
use serde::Serialize;
use vouch_common::RunSummary;

use crate::domain::{Scenario, SuiteKind};

/// Renders reports and listings as JSON documents.
pub struct JsonRenderer;

impl JsonRenderer {
    /// Render a full run summary, the contract consumed by CI.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_summary(summary: &RunSummary) -> Result<()> {
        print_pretty(summary)
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_plan(scenarios: &[Scenario]) -> Result<()> {
        print_pretty(&serde_json::json!({
            "valid": true,
            "scenarios": scenarios,
        }))
    }

    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn render_suites() -> Result<()> {
        let suites: Vec<_> = SuiteKind::ALL
            .into_iter()
            .map(|kind| {
                serde_json::json!({
                    "name": kind.name(),
                    "summary": kind.summary(),
                    "probes": kind.suite().probes,
                })
            })
            .collect();
        print_pretty(&suites)
    }

    pub fn render_version(version: &str) {
        println!(r#"{{"version":"{version}"}}"#);
    }
}

fn print_pretty<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("JSON serialization failed")?;
    println!("{json}");
    Ok(())
}

/// Format a JSON error object.
///
/// Output (pretty-printed):
/// ```json
/// {
///   "error": true,
///   "message": "...",
///   "code": "..."
/// }
/// ```
///
/// # Errors
///
/// Returns an error if JSON serialization fails.
pub fn format_error(message: &str, code: &str) -> Result<String> {
    let obj = serde_json::json!({
        "error": true,
        "message": message,
        "code": code,
    });
    serde_json::to_string_pretty(&obj).context("JSON serialization failed")
}
