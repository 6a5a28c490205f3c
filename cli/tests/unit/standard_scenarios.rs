//! End-to-end runs of the three preset deployments against a compliant host.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use vouch_cli::application::services::ScenarioRunner;
use vouch_cli::domain::Preset;
use vouch_common::{ProbeOutcome, ScenarioOutcome};

use crate::mocks::{Harness, MockInventory, MockProvisioner, ScriptedExecutor, preset_scenario};

async fn run_preset(name: &str, preset: Preset) -> vouch_common::ScenarioReport {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed(name, preset),
    );
    h.orchestrator()
        .run_scenario(&preset_scenario(name, preset))
        .await
}

#[tokio::test]
async fn test_minimal_preset_runs_security_runtime_and_metadata() {
    let report = run_preset("minimal", Preset::Minimal).await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass, "{report:#?}");
    let sizes: Vec<_> = report
        .suites
        .iter()
        .map(|s| (s.name.as_str(), s.count(ProbeOutcome::Pass)))
        .collect();
    assert_eq!(sizes, [("security", 4), ("runtime", 3), ("metadata", 1)]);
    assert!(report.suite("monitoring").is_none());

    let fips = report
        .expectations
        .iter()
        .find(|e| e.subject == "tag:FIPS")
        .unwrap();
    assert_eq!(fips.outcome, ProbeOutcome::Pass);
    assert_eq!(report.metadata.tags["FIPS"], "enabled");
}

#[tokio::test]
async fn test_standard_preset_adds_monitoring_and_log_group() {
    let report = run_preset("standard", Preset::Standard).await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass, "{report:#?}");
    assert_eq!(report.probe_count(), 10);
    assert!(report.find_probe("cloudwatch_agent_running").unwrap().outcome.is_pass());
    assert!(report.find_probe("ssm_agent_running").unwrap().outcome.is_pass());
    assert_eq!(
        report.metadata.outputs["cloudwatch_log_group_name"],
        "/standard/ec2"
    );
}

#[tokio::test]
async fn test_full_preset_checks_alarm_topic() {
    let report = run_preset("full", Preset::Full).await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass, "{report:#?}");
    assert_eq!(report.suite("monitoring").unwrap().results.len(), 2);
    let sns = report
        .expectations
        .iter()
        .find(|e| e.subject == "output:sns_topic_arn")
        .unwrap();
    assert!(sns.outcome.is_pass());
    // The full deployment does not assert module or OS tags.
    assert!(!report.expectations.iter().any(|e| e.subject == "tag:Module"));
}

#[tokio::test]
async fn test_log_group_mismatch_fails_standard_preset() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed("other", Preset::Standard),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("standard", Preset::Standard))
        .await;

    let log_group = report
        .expectations
        .iter()
        .find(|e| e.subject == "output:cloudwatch_log_group_name")
        .unwrap();
    assert_eq!(log_group.outcome, ProbeOutcome::Fail);
    assert_eq!(report.outcome, ScenarioOutcome::Fail);
}

#[tokio::test]
async fn test_all_presets_together() {
    let presets = [
        ("minimal", Preset::Minimal),
        ("standard", Preset::Standard),
        ("full", Preset::Full),
    ];
    for (name, preset) in presets {
        let h = Harness::new(
            MockProvisioner::new(),
            ScriptedExecutor::compliant(),
            MockInventory::deployed(name, preset),
        );
        let summary = ScenarioRunner::new(h.orchestrator())
            .run_all(vec![preset_scenario(name, preset)])
            .await;
        assert!(summary.passed(), "{name}: {summary:#?}");
        assert_eq!(h.provisioner.destroys().len(), 1);
    }
}
