//! Infrastructure implementation of the `ConfigStore` port, plus the
//! scenario file and `VOUCH_*` environment readers.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::application::ports::ConfigStore;
use crate::domain::{EnvOverrides, HarnessConfig, ScenarioFile};

/// Production implementation of `ConfigStore` that reads a YAML file on disk.
#[derive(Debug, Default)]
pub struct YamlConfigStore {
    /// Explicit `--config` path; wins over `VOUCH_CONFIG` and the default.
    explicit: Option<PathBuf>,
}

impl YamlConfigStore {
    #[must_use]
    pub fn new(explicit: Option<PathBuf>) -> Self {
        Self { explicit }
    }
}

impl ConfigStore for YamlConfigStore {
    fn load(&self) -> Result<HarnessConfig> {
        let path = self.path()?;
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(HarnessConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))
    }

    fn path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.explicit {
            return Ok(path.clone());
        }
        if let Ok(val) = std::env::var("VOUCH_CONFIG") {
            return Ok(PathBuf::from(val));
        }
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        Ok(home.join(".vouch").join("config.yaml"))
    }
}

/// Read `VOUCH_SUBNET_ID`, `VOUCH_AWS_REGION`, `VOUCH_SSH_KEY`,
/// `VOUCH_SSH_USER` and `VOUCH_KEY_PAIR`.
///
/// # Errors
///
/// Returns an error if a variable is present but cannot be decoded.
pub fn env_overrides() -> Result<EnvOverrides> {
    envy::prefixed("VOUCH_")
        .from_env::<EnvOverrides>()
        .context("invalid VOUCH_* environment variable")
}

/// Load settings from `store`, layer environment overrides, and validate.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if the
/// resulting settings are invalid.
pub fn load_harness_config(store: &dyn ConfigStore) -> Result<HarnessConfig> {
    let mut config = store.load()?;
    config.apply_env(env_overrides()?);
    config.validate()?;
    Ok(config)
}

/// A parsed scenario file and the directory relative paths resolve against.
#[derive(Debug)]
pub struct LoadedScenarios {
    pub file: ScenarioFile,
    pub base_dir: PathBuf,
}

/// Read and parse a YAML scenario file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid scenario
/// document.
pub fn load_scenario_file(path: &Path) -> Result<LoadedScenarios> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read scenario file {}", path.display()))?;
    let file: ScenarioFile = serde_yaml::from_str(&content)
        .with_context(|| format!("cannot parse scenario file {}", path.display()))?;
    let base_dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok(LoadedScenarios { file, base_dir })
}
