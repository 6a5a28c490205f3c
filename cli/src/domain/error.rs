//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::path::PathBuf;

use thiserror::Error;

// ── Collaborator errors ───────────────────────────────────────────────────────

/// Resource creation failed. Fatal to the scenario; any partially created
/// resources are the provisioner's to clean up before returning this.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("template directory not found: {}", .0.display())]
    TemplateNotFound(PathBuf),

    #[error("provisioning tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("{step} failed: {detail}")]
    StepFailed { step: &'static str, detail: String },

    #[error("provisioned template did not declare output '{0}'")]
    MissingOutput(String),

    #[error("provisioning was interrupted: {0}")]
    Interrupted(String),
}

/// Deprovisioning failed. Resources may have leaked.
#[derive(Debug, Error)]
pub enum DestroyError {
    #[error("destroy failed for {handle}: {detail}")]
    StepFailed { handle: String, detail: String },
}

/// A remote command could not be delivered or did not complete.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("target {address} unreachable: {detail}")]
    Unreachable { address: String, detail: String },

    #[error("remote command timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("remote command was terminated by a signal")]
    Terminated,

    #[error("transport failure: {0}")]
    Other(String),
}

/// Readiness was never signalled within the attempt bound.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("target not ready after {attempts} attempts: {last_diagnostic}")]
pub struct ReadinessTimeout {
    pub attempts: u32,
    pub last_diagnostic: String,
}

/// Tag or output lookup against the control plane failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryError {
    #[error("tag lookup for {resource} failed: {detail}")]
    Tags { resource: String, detail: String },

    #[error("output '{name}' not available: {detail}")]
    Output { name: String, detail: String },
}

/// A local tool did not finish within its allotted time and was killed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{program} timed out after {secs}s")]
pub struct CommandTimeout {
    pub program: String,
    pub secs: u64,
}

// ── Scenario errors ───────────────────────────────────────────────────────────

/// Errors raised while turning a scenario file into runnable scenarios.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("Invalid scenario name '{0}': must match ^[a-z0-9]([a-z0-9-]{{0,61}}[a-z0-9])?$")]
    InvalidName(String),

    #[error("Scenario '{0}' is defined more than once.")]
    DuplicateName(String),

    #[error("Scenario '{0}' has no suites to run. Set a preset, 'suites', or 'custom_suites'.")]
    NoSuites(String),

    #[error("Scenario '{scenario}': probe '{probe}' is invalid: {reason}")]
    InvalidProbe {
        scenario: String,
        probe: String,
        reason: String,
    },

    #[error("Scenario '{scenario}': suite '{suite}' is defined more than once.")]
    DuplicateSuite { scenario: String, suite: String },

    #[error("Scenario '{scenario}': invalid template: {reason}")]
    InvalidTemplate { scenario: String, reason: String },

    #[error("Scenario file defines no scenarios.")]
    Empty,

    #[error("No scenario named '{0}' in file.")]
    UnknownScenario(String),
}

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors related to harness settings and command-line overrides.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid variable '{0}': expected KEY=VALUE")]
    InvalidVar(String),

    #[error("Invalid value for {key}: {value}\n\nValid values: {valid}")]
    InvalidValue {
        key: String,
        value: String,
        valid: String,
    },
}
