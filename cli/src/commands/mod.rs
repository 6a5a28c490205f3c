//! Command implementations

pub mod run;
pub mod suites;
pub mod validate;
pub mod version;

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::Value;

use crate::app::AppContext;
use crate::domain::{BuildContext, HarnessConfig, Scenario, parse_var};
use crate::infra::{load_harness_config, load_scenario_file};

/// Harness settings plus the scenarios a command will act on.
pub struct Loaded {
    pub config: HarnessConfig,
    pub scenarios: Vec<Scenario>,
}

/// Load settings and build scenarios from `file`, keeping only the names
/// in `only` when it is non-empty.
///
/// # Errors
///
/// Returns an error if settings, the scenario file, or a `--var` override
/// are invalid.
pub fn load_scenarios(
    app: &AppContext,
    file: &Path,
    only: &[String],
    vars: &[String],
) -> Result<Loaded> {
    let config = load_harness_config(&app.config_store)?;
    let overrides = vars
        .iter()
        .map(|raw| parse_var(raw))
        .collect::<Result<BTreeMap<String, Value>, _>>()?;

    let loaded = load_scenario_file(file)?;
    let ctx = BuildContext {
        config: &config,
        overrides: &overrides,
        base_dir: &loaded.base_dir,
    };
    let scenarios = loaded
        .file
        .build(&ctx, only)
        .with_context(|| format!("invalid scenario file {}", file.display()))?;
    tracing::debug!(count = scenarios.len(), file = %file.display(), "scenarios loaded");
    Ok(Loaded { config, scenarios })
}
