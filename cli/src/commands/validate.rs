//! `vouch validate <file>`: check a scenario file without provisioning.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::commands::load_scenarios;

/// Arguments for the validate command.
#[derive(Args)]
pub struct ValidateArgs {
    /// Scenario file (YAML)
    pub file: PathBuf,

    /// Template variable override, applied to every scenario (repeatable)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    pub vars: Vec<String>,
}

/// Run `vouch validate`.
///
/// # Errors
///
/// Returns an error describing the first problem found in the file.
pub fn run(app: &AppContext, args: &ValidateArgs) -> Result<()> {
    let loaded = load_scenarios(app, &args.file, &[], &args.vars)?;
    app.renderer().render_plan(&loaded.scenarios)?;
    if !app.is_json() {
        let n = loaded.scenarios.len();
        let noun = if n == 1 { "scenario" } else { "scenarios" };
        app.output
            .success(&format!("{} is valid ({n} {noun})", args.file.display()));
    }
    Ok(())
}
