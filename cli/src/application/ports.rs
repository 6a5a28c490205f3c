//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.
//!
//! Collaborator ports are shared across concurrently running scenarios as
//! `Arc<dyn Port>`, so they are object-safe and `Send + Sync`.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Output;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{
    CommandOutput, DestroyError, InventoryError, ProvisionError, Target, TransportError,
};

// ── Value Types ───────────────────────────────────────────────────────────────

/// Everything a provisioner needs to create one target.
#[derive(Debug, Clone, Copy)]
pub struct TemplateSpec<'a> {
    /// Scenario name, used to label temporary state.
    pub scenario: &'a str,
    /// Directory copied before provisioning.
    pub root: &'a Path,
    /// Working directory relative to `root`.
    pub dir: &'a Path,
    /// Fully merged template variables.
    pub vars: &'a BTreeMap<String, Value>,
}

// ── Collaborator Ports ────────────────────────────────────────────────────────

/// Creates and destroys remote targets.
#[async_trait]
pub trait Provisioner: Send + Sync {
    /// Create a target. On error, nothing the call created may remain.
    async fn create(&self, spec: &TemplateSpec<'_>) -> Result<Target, ProvisionError>;
    /// Release a target. Calling this twice for the same target is a no-op.
    async fn destroy(&self, target: &Target) -> Result<(), DestroyError>;
}

/// Runs shell commands on a target.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    /// Execute `command` and return combined output with the exit status.
    /// A non-zero exit is data, not an error.
    async fn execute(&self, target: &Target, command: &str)
    -> Result<CommandOutput, TransportError>;
}

/// Reads control-plane metadata about a provisioned target.
#[async_trait]
pub trait InventoryReader: Send + Sync {
    async fn get_tags(&self, resource_id: &str)
    -> Result<BTreeMap<String, String>, InventoryError>;
    /// Read one declared template output for the provisioning handle.
    async fn get_output(&self, handle: &str, name: &str) -> Result<String, InventoryError>;
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a program and capture its output.
    ///
    /// Implementations should delegate to `run_with_timeout` using the
    /// instance's configured default timeout.
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output>;
    /// Run a program with a custom timeout override.
    ///
    /// # Errors
    ///
    /// Returns an error if the process cannot be spawned or exceeds `timeout`.
    /// On timeout, the child process must be killed (not left orphaned) and
    /// the error must carry [`crate::domain::error::CommandTimeout`].
    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        timeout: std::time::Duration,
    ) -> Result<Output>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait; no async needed.
pub trait ProgressReporter: Send + Sync {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}

// ── Config Port ───────────────────────────────────────────────────────────────

/// Abstracts where harness settings come from.
pub trait ConfigStore {
    /// Load settings, falling back to defaults when no file exists.
    fn load(&self) -> Result<crate::domain::HarnessConfig>;
    /// Path of the settings file, whether or not it exists.
    fn path(&self) -> Result<std::path::PathBuf>;
}
