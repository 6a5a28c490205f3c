//! Infrastructure layer: concrete implementations of application port traits.
//!
//! This module contains all I/O-performing code: process execution, the
//! terraform and ssh adapters, inventory lookups, and file loading.
//!
//! Imports from `crate::domain` and `crate::application::ports` are allowed.
//! Imports from `crate::commands` or `crate::output` are forbidden.

pub mod command_runner;
pub mod config;
pub mod inventory;
pub mod ssh;
pub mod terraform;

pub use command_runner::TokioCommandRunner;
pub use config::{LoadedScenarios, YamlConfigStore, load_harness_config, load_scenario_file};
pub use inventory::AwsInventory;
pub use ssh::SshExecutor;
pub use terraform::TerraformProvisioner;
