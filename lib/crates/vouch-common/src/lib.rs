//! Shared types for vouch verification reports.
//!
//! These records are the machine-readable contract of a verification run:
//! everything here is `Serialize + Deserialize` so downstream assertion
//! layers can consume `vouch run --json` output without depending on the CLI.

pub mod types;

pub use types::{
    ExpectationResult, ProbeOutcome, ProbeResult, ProvisioningMetadata, RunSummary,
    ScenarioOutcome, ScenarioReport, ScenarioState, SuiteReport, TeardownStatus,
};
