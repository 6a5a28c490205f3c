use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Classification of a single verification step.
///
/// `Error` is distinct from `Fail`: it means the check could not be carried
/// out (transport trouble, unclassifiable output), not that the target is
/// non-compliant.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ProbeOutcome {
    Pass,
    Fail,
    Error,
}

impl ProbeOutcome {
    #[must_use]
    pub fn is_pass(self) -> bool {
        self == Self::Pass
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

/// Result of running one probe against one target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeResult {
    /// Probe name, e.g. `fips_kernel_enabled`.
    pub probe: String,
    pub outcome: ProbeOutcome,
    /// Observed command output (stdout followed by stderr).
    #[serde(default)]
    pub output: String,
    /// Remote exit status, absent when the command never completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_status: Option<i32>,
    /// Why the probe did not pass, or the transport error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ProbeResult {
    #[must_use]
    pub fn pass(probe: impl Into<String>, output: impl Into<String>, exit_status: i32) -> Self {
        Self {
            probe: probe.into(),
            outcome: ProbeOutcome::Pass,
            output: output.into(),
            exit_status: Some(exit_status),
            detail: None,
        }
    }

    #[must_use]
    pub fn fail(
        probe: impl Into<String>,
        output: impl Into<String>,
        exit_status: i32,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            probe: probe.into(),
            outcome: ProbeOutcome::Fail,
            output: output.into(),
            exit_status: Some(exit_status),
            detail: Some(detail.into()),
        }
    }

    /// A probe whose command could not be delivered or whose output could
    /// not be classified.
    #[must_use]
    pub fn error(
        probe: impl Into<String>,
        output: impl Into<String>,
        exit_status: Option<i32>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            probe: probe.into(),
            outcome: ProbeOutcome::Error,
            output: output.into(),
            exit_status,
            detail: Some(detail.into()),
        }
    }
}

/// All results produced by one suite invocation, in probe order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SuiteReport {
    pub name: String,
    pub results: Vec<ProbeResult>,
}

impl SuiteReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.outcome.is_pass())
    }

    #[must_use]
    pub fn count(&self, outcome: ProbeOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }
}

/// Result of checking one declared tag or output against inventory.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExpectationResult {
    /// `tag:<key>` or `output:<name>`.
    pub subject: String,
    pub outcome: ProbeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Lifecycle state of a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioState {
    Created,
    Provisioning,
    AwaitingReady,
    Verifying,
    TornDown,
    Failed,
}

/// Overall scenario verdict.
///
/// `Fail` means verification ran and found violations; `Failed` means the
/// scenario never got that far (provisioning, readiness, cancellation) or
/// left infrastructure behind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScenarioOutcome {
    Pass,
    Fail,
    Failed,
}

impl ScenarioOutcome {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Failed => "failed",
        }
    }
}

/// What happened when the scenario released its target.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TeardownStatus {
    /// Provisioning never produced a target.
    NotRequired,
    Completed,
    /// The destroy call failed; resources may have leaked.
    Failed { error: String },
    /// The scenario task died without reporting; a target may still exist.
    Unknown,
}

impl TeardownStatus {
    /// Whether provisioned resources may have outlived the scenario.
    #[must_use]
    pub fn leaked(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Unknown)
    }
}

/// Identity and declared outputs of the provisioned instance.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProvisioningMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default)]
    pub outputs: BTreeMap<String, String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Finalized record of one provision-verify-teardown run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScenarioReport {
    pub scenario: String,
    pub outcome: ScenarioOutcome,
    pub final_state: ScenarioState,
    pub teardown: TeardownStatus,
    /// Why the scenario failed before or outside verification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Readiness attempts used, when polling ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readiness_attempts: Option<u32>,
    #[serde(default)]
    pub metadata: ProvisioningMetadata,
    #[serde(default)]
    pub expectations: Vec<ExpectationResult>,
    #[serde(default)]
    pub suites: Vec<SuiteReport>,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
}

impl ScenarioReport {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.outcome == ScenarioOutcome::Pass
    }

    /// Every probe result across all suites, in execution order.
    pub fn probe_results(&self) -> impl Iterator<Item = &ProbeResult> {
        self.suites.iter().flat_map(|s| s.results.iter())
    }

    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.suites.iter().map(|s| s.results.len()).sum()
    }

    #[must_use]
    pub fn find_probe(&self, name: &str) -> Option<&ProbeResult> {
        self.probe_results().find(|r| r.probe == name)
    }

    #[must_use]
    pub fn suite(&self, name: &str) -> Option<&SuiteReport> {
        self.suites.iter().find(|s| s.name == name)
    }
}

/// Reports from one `run_all` invocation, in input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunSummary {
    pub reports: Vec<ScenarioReport>,
}

impl RunSummary {
    /// Logical AND of every scenario outcome. An empty run passes.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.reports.iter().all(ScenarioReport::passed)
    }

    #[must_use]
    pub fn count(&self, outcome: ScenarioOutcome) -> usize {
        self.reports.iter().filter(|r| r.outcome == outcome).count()
    }
}
