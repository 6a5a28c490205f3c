//! Domain types and validators for harness configuration.
//!
//! Pure functions only, no I/O. Loading lives in `infra::config`.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;

// ── Defaults ─────────────────────────────────────────────────────────────────

pub const DEFAULT_READINESS_ATTEMPTS: u32 = 20;
pub const DEFAULT_READINESS_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_READINESS_COMMAND: &str = "cloud-init status --wait";
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 120;
pub const DEFAULT_PROVISION_TIMEOUT_SECS: u64 = 1800;
pub const DEFAULT_SSH_USER: &str = "rocky";

// ── Config schema ────────────────────────────────────────────────────────────

/// Top-level configuration stored in `~/.vouch/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct HarnessConfig {
    pub readiness: ReadinessPolicy,
    pub execution: ExecutionConfig,
    pub runner: RunnerConfig,
    pub ssh: SshConfig,
    pub aws: AwsConfig,
    pub defaults: DefaultsConfig,
}

/// Bounded readiness polling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ReadinessPolicy {
    pub max_attempts: u32,
    pub interval_secs: u64,
    /// Remote command whose zero exit signals readiness.
    pub command: String,
}

impl Default for ReadinessPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_READINESS_ATTEMPTS,
            interval_secs: DEFAULT_READINESS_INTERVAL_SECS,
            command: DEFAULT_READINESS_COMMAND.to_string(),
        }
    }
}

impl ReadinessPolicy {
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Per-call timeouts for external tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Remote probe and inventory lookups.
    pub command_timeout_secs: u64,
    /// Template apply and destroy.
    pub provision_timeout_secs: u64,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            provision_timeout_secs: DEFAULT_PROVISION_TIMEOUT_SECS,
        }
    }
}

impl ExecutionConfig {
    #[must_use]
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    #[must_use]
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct RunnerConfig {
    /// Upper bound on concurrent `create` calls. Unbounded when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_concurrent_provisions: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SshConfig {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_key: Option<PathBuf>,
    pub port: u16,
    pub connect_timeout_secs: u64,
    /// Extra `-o` options passed verbatim to the ssh client.
    pub options: Vec<String>,
}

impl Default for SshConfig {
    fn default() -> Self {
        Self {
            user: DEFAULT_SSH_USER.to_string(),
            private_key: None,
            port: 22,
            connect_timeout_secs: 10,
            options: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AwsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    /// EC2 key pair passed to templates as `key_pair_name`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_pair: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Template variables merged under every scenario's own vars.
    pub vars: BTreeMap<String, serde_json::Value>,
}

/// `VOUCH_*` environment overrides, read by the CLI layer only.
#[derive(Debug, Clone, Deserialize, Default, PartialEq, Eq)]
pub struct EnvOverrides {
    pub subnet_id: Option<String>,
    pub aws_region: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub ssh_user: Option<String>,
    pub key_pair: Option<String>,
}

impl HarnessConfig {
    /// Layer environment overrides on top of file settings.
    pub fn apply_env(&mut self, env: EnvOverrides) {
        if let Some(subnet) = env.subnet_id {
            self.defaults
                .vars
                .insert("subnet_id".to_string(), serde_json::Value::String(subnet));
        }
        if let Some(region) = env.aws_region {
            self.aws.region = Some(region);
        }
        if let Some(key) = env.ssh_key {
            self.ssh.private_key = Some(key);
        }
        if let Some(user) = env.ssh_user {
            self.ssh.user = user;
        }
        if let Some(key_pair) = env.key_pair {
            self.aws.key_pair = Some(key_pair);
        }
    }

    /// Reject settings that would make the harness hang or never run.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.execution.command_timeout_secs == 0 {
            return Err(invalid(
                "execution.command_timeout_secs",
                "0",
                "a positive number of seconds",
            ));
        }
        if self.execution.provision_timeout_secs == 0 {
            return Err(invalid(
                "execution.provision_timeout_secs",
                "0",
                "a positive number of seconds",
            ));
        }
        if self.runner.max_concurrent_provisions == Some(0) {
            return Err(invalid(
                "runner.max_concurrent_provisions",
                "0",
                "a positive integer, or omit for unbounded",
            ));
        }
        if self.ssh.port == 0 {
            return Err(invalid("ssh.port", "0", "1-65535"));
        }
        if self.ssh.user.trim().is_empty() {
            return Err(invalid("ssh.user", "\"\"", "a login name"));
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str, valid: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        valid: valid.to_string(),
    }
}

// ── Variable overrides ───────────────────────────────────────────────────────

/// Parse a `KEY=VALUE` template variable from the command line.
///
/// Values that parse as JSON scalars (`true`, `3`, `"x"`) keep their type;
/// anything else is a string.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidVar`] if there is no `=` or the key is empty.
pub fn parse_var(raw: &str) -> Result<(String, serde_json::Value), ConfigError> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidVar(raw.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ConfigError::InvalidVar(raw.to_string()));
    }
    let value = match serde_json::from_str::<serde_json::Value>(value) {
        Ok(v) if !v.is_object() && !v.is_array() => v,
        _ => serde_json::Value::String(value.to_string()),
    };
    Ok((key.to_string(), value))
}

// ── Unit tests ───────────────────────────────────────────────────────────────
