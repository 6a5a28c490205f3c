//! Concurrency tests for `ScenarioRunner`.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use vouch_cli::application::services::ScenarioRunner;
use vouch_cli::domain::Preset;
use vouch_common::{ScenarioOutcome, TeardownStatus};

use crate::mocks::{Harness, MockInventory, MockProvisioner, ScriptedExecutor, probes_only};

fn scenarios(names: &[&str]) -> Vec<vouch_cli::domain::Scenario> {
    names
        .iter()
        .map(|n| probes_only(n, Preset::Minimal))
        .collect()
}

#[tokio::test]
async fn test_run_all_isolates_a_provisioning_failure() {
    let h = Harness::new(
        MockProvisioner::new().failing_create_for("beta"),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let summary = ScenarioRunner::new(h.orchestrator())
        .run_all(scenarios(&["alpha", "beta", "gamma"]))
        .await;

    let names: Vec<_> = summary.reports.iter().map(|r| r.scenario.as_str()).collect();
    assert_eq!(names, ["alpha", "beta", "gamma"], "input order preserved");
    assert_eq!(summary.reports[0].outcome, ScenarioOutcome::Pass);
    assert_eq!(summary.reports[1].outcome, ScenarioOutcome::Failed);
    assert_eq!(summary.reports[1].teardown, TeardownStatus::NotRequired);
    assert_eq!(summary.reports[2].outcome, ScenarioOutcome::Pass);
    assert!(!summary.passed());

    let mut destroyed = h.provisioner.destroys();
    destroyed.sort();
    assert_eq!(destroyed.len(), 2);
    assert!(destroyed.iter().all(|d| !d.contains("beta")));
}

#[tokio::test]
async fn test_run_all_reports_a_crashed_task_as_unknown_teardown() {
    let h = Harness::new(
        MockProvisioner::new().panicking_create_for("beta"),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let summary = ScenarioRunner::new(h.orchestrator())
        .run_all(scenarios(&["alpha", "beta"]))
        .await;

    let crashed = &summary.reports[1];
    assert_eq!(crashed.scenario, "beta");
    assert_eq!(crashed.outcome, ScenarioOutcome::Failed);
    assert_eq!(crashed.teardown, TeardownStatus::Unknown);
    let error = crashed.error.as_deref().unwrap();
    assert!(error.contains("provider plugin crashed"), "got: {error}");
    assert!(summary.reports[0].passed());
}

#[tokio::test]
async fn test_run_all_with_no_scenarios_passes() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let summary = ScenarioRunner::new(h.orchestrator()).run_all(Vec::new()).await;

    assert!(summary.reports.is_empty());
    assert!(summary.passed());
}

#[tokio::test(start_paused = true)]
async fn test_run_all_overlaps_provisioning() {
    let h = Harness::new(
        MockProvisioner::new().with_create_delay(Duration::from_secs(300)),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let summary = ScenarioRunner::new(h.orchestrator())
        .run_all(scenarios(&["a", "b", "c", "d"]))
        .await;

    assert!(summary.passed());
    assert_eq!(h.provisioner.peak_concurrency(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_admission_limit_bounds_concurrent_creates() {
    let h = Harness::new(
        MockProvisioner::new().with_create_delay(Duration::from_secs(300)),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );
    let orchestrator = h.orchestrator().with_max_concurrent_provisions(Some(2));

    let summary = ScenarioRunner::new(orchestrator)
        .run_all(scenarios(&["a", "b", "c", "d", "e"]))
        .await;

    assert!(summary.passed());
    assert_eq!(h.provisioner.creates().len(), 5);
    assert_eq!(h.provisioner.peak_concurrency(), 2);
    assert_eq!(h.provisioner.destroys().len(), 5);
}

#[tokio::test]
async fn test_run_scenario_delegates_to_orchestrator() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let report = ScenarioRunner::new(h.orchestrator())
        .run_scenario(&probes_only("solo", Preset::Minimal))
        .await;

    assert!(report.passed());
    assert_eq!(h.provisioner.creates(), ["solo"]);
}
