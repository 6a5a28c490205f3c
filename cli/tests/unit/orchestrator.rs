//! Lifecycle tests for `ScenarioOrchestrator`.
//!
//! Every test drives one scenario against mock collaborators and checks the
//! finalized report plus the teardown calls the provisioner saw.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use vouch_cli::domain::{CommandOutput, Preset, TransportError};
use vouch_common::{ProbeOutcome, ScenarioOutcome, ScenarioState, TeardownStatus};

use crate::mocks::{
    Harness, MockInventory, MockProvisioner, ScriptedExecutor, compliant_host, handle_of,
    preset_scenario, probes_only, quick_readiness,
};

fn compliant_harness(scenario: &str, preset: Preset) -> Harness {
    Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed(scenario, preset),
    )
}

#[tokio::test]
async fn test_compliant_minimal_scenario_passes_and_tears_down_once() {
    let h = compliant_harness("minimal", Preset::Minimal);
    let scenario = preset_scenario("minimal", Preset::Minimal);

    let report = h.orchestrator().run_scenario(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass, "{report:#?}");
    assert_eq!(report.final_state, ScenarioState::TornDown);
    assert_eq!(report.teardown, TeardownStatus::Completed);
    assert_eq!(report.error, None);
    assert_eq!(report.readiness_attempts, Some(1));
    assert_eq!(report.probe_count(), scenario.probe_count());
    assert!(report.expectations.iter().all(|e| e.outcome.is_pass()));
    assert_eq!(h.provisioner.creates(), ["minimal"]);
    assert_eq!(h.provisioner.destroys(), [handle_of("minimal")]);
}

#[tokio::test]
async fn test_metadata_records_identity_outputs_and_tags() {
    let h = compliant_harness("minimal", Preset::Minimal);
    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let meta = &report.metadata;
    assert_eq!(meta.instance_id.as_deref(), Some("i-minimal"));
    assert_eq!(meta.address.as_deref(), Some("198.51.100.10"));
    assert_eq!(meta.tags.get("FIPS").map(String::as_str), Some("enabled"));
    assert!(meta.outputs.contains_key("ssh_command"));
}

#[tokio::test]
async fn test_provisioning_failure_skips_teardown() {
    let h = Harness::new(
        MockProvisioner::new().failing_create_for("minimal"),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.final_state, ScenarioState::Failed);
    assert_eq!(report.teardown, TeardownStatus::NotRequired);
    let error = report.error.expect("error recorded");
    assert!(error.contains("provisioning failed"), "got: {error}");
    assert!(error.contains("InsufficientInstanceCapacity"), "got: {error}");
    assert!(h.provisioner.destroys().is_empty());
    assert!(h.executor.commands().is_empty());
    assert!(report.suites.is_empty());
}

#[tokio::test]
async fn test_readiness_timeout_still_tears_down() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|cmd| {
            if cmd.starts_with("cloud-init") {
                Ok(CommandOutput::new("status: error\n", 1))
            } else {
                compliant_host(cmd)
            }
        }),
        MockInventory::new(),
    );
    let scenario = probes_only("minimal", Preset::Minimal).with_readiness(quick_readiness(3));

    let report = h.orchestrator().run_scenario(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.final_state, ScenarioState::Failed);
    assert_eq!(report.teardown, TeardownStatus::Completed);
    assert_eq!(report.readiness_attempts, Some(3));
    let error = report.error.expect("error recorded");
    assert!(error.contains("not ready after 3 attempts"), "got: {error}");
    assert!(error.contains("critical failure"), "got: {error}");
    assert!(report.suites.is_empty(), "no probe may run before readiness");
    assert_eq!(h.executor.count("cloud-init"), 3);
    assert_eq!(h.provisioner.destroys().len(), 1);
}

#[tokio::test]
async fn test_unreachable_target_exhausts_readiness() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|_| {
            Err(TransportError::Unreachable {
                address: "198.51.100.10".into(),
                detail: "Connection refused".into(),
            })
        }),
        MockInventory::new(),
    );
    let scenario = probes_only("minimal", Preset::Minimal).with_readiness(quick_readiness(2));

    let report = h.orchestrator().run_scenario(&scenario).await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.readiness_attempts, Some(2));
    assert!(report.error.as_deref().unwrap().contains("Connection refused"));
    assert_eq!(h.provisioner.destroys().len(), 1);
}

#[tokio::test]
async fn test_probe_violation_is_fail_not_failed() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|cmd| {
            if cmd == "getenforce" {
                Ok(CommandOutput::new("Permissive\n", 0))
            } else {
                compliant_host(cmd)
            }
        }),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Fail);
    assert_eq!(report.final_state, ScenarioState::TornDown);
    assert_eq!(report.error, None);
    let selinux = report.find_probe("selinux_enforcing").unwrap();
    assert_eq!(selinux.outcome, ProbeOutcome::Fail);
    assert_eq!(selinux.output, "Permissive\n");
    // Later suites still run after a failing probe.
    assert!(report.suite("metadata").unwrap().passed());
}

#[tokio::test]
async fn test_transport_error_mid_suite_is_error_outcome() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|cmd| {
            if cmd.contains("fips-mode-setup") {
                Err(TransportError::Timeout { secs: 120 })
            } else {
                compliant_host(cmd)
            }
        }),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    let probe = report.find_probe("fips_mode_setup_check").unwrap();
    assert_eq!(probe.outcome, ProbeOutcome::Error);
    assert_eq!(probe.exit_status, None);
    assert!(probe.detail.as_deref().unwrap().contains("timed out"));
    // The next probe in the same suite still ran.
    assert!(report.find_probe("md5_blocked").unwrap().outcome.is_pass());
    assert_eq!(report.outcome, ScenarioOutcome::Fail);
}

#[tokio::test]
async fn test_md5_accepted_is_fail() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|cmd| {
            if cmd.starts_with("openssl md5") {
                Ok(CommandOutput::new(
                    "MD5(/dev/null)= d41d8cd98f00b204e9800998ecf8427e\n",
                    0,
                ))
            } else {
                compliant_host(cmd)
            }
        }),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    let md5 = report.find_probe("md5_blocked").unwrap();
    assert_eq!(md5.outcome, ProbeOutcome::Fail);
    assert_eq!(report.outcome, ScenarioOutcome::Fail);
}

#[tokio::test]
async fn test_destroy_failure_marks_scenario_failed() {
    let h = Harness::new(
        MockProvisioner::new().failing_destroy(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed("minimal", Preset::Minimal),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.final_state, ScenarioState::Failed);
    assert!(report.teardown.leaked());
    let TeardownStatus::Failed { error } = &report.teardown else {
        panic!("expected failed teardown, got {:?}", report.teardown);
    };
    assert!(error.contains("DependencyViolation"), "got: {error}");
    // Verification results are still reported.
    assert!(report.suites.iter().all(|s| s.passed()));
    assert!(
        h.reporter
            .events()
            .iter()
            .any(|e| e.starts_with("warn:") && e.contains("teardown failed"))
    );
}

#[tokio::test]
async fn test_panic_during_verification_still_tears_down() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(|cmd| {
            if cmd == "getenforce" {
                panic!("executor bug");
            }
            compliant_host(cmd)
        }),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.teardown, TeardownStatus::Completed);
    let error = report.error.as_deref().unwrap();
    assert!(error.contains("panicked"), "got: {error}");
    assert!(error.contains("executor bug"), "got: {error}");
    // Suites completed before the panic survive.
    assert!(report.suite("security").unwrap().passed());
    assert!(report.suite("runtime").is_none());
    assert_eq!(h.provisioner.destroys().len(), 1);
}

#[tokio::test]
async fn test_cancelled_before_start_provisions_nothing() {
    let h = compliant_harness("minimal", Preset::Minimal);
    let token = CancellationToken::new();
    token.cancel();

    let report = h
        .orchestrator()
        .with_cancellation(token)
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.teardown, TeardownStatus::NotRequired);
    assert!(report.error.as_deref().unwrap().contains("cancelled before provisioning"));
    assert!(h.provisioner.creates().is_empty());
}

#[tokio::test]
async fn test_cancel_during_verification_stops_at_next_suite() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(move |cmd| {
            if cmd == "getenforce" {
                trigger.cancel();
            }
            compliant_host(cmd)
        }),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .with_cancellation(token)
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert_eq!(report.teardown, TeardownStatus::Completed);
    assert!(report.error.as_deref().unwrap().contains("cancelled during verification"));
    let suites: Vec<_> = report.suites.iter().map(|s| s.name.as_str()).collect();
    assert_eq!(suites, ["security", "runtime"]);
    assert_eq!(h.provisioner.destroys().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_while_awaiting_readiness_tears_down() {
    let token = CancellationToken::new();
    let trigger = token.clone();
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::new(move |cmd| {
            trigger.cancel();
            if cmd.starts_with("cloud-init") {
                Ok(CommandOutput::new("status: running\n", 3))
            } else {
                compliant_host(cmd)
            }
        }),
        MockInventory::new(),
    );
    let mut readiness = quick_readiness(20);
    readiness.interval_secs = 3600;
    let scenario = probes_only("minimal", Preset::Minimal).with_readiness(readiness);

    let report = h
        .orchestrator()
        .with_cancellation(token)
        .run_scenario(&scenario)
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Failed);
    assert!(report.error.as_deref().unwrap().contains("awaiting readiness"));
    assert_eq!(report.teardown, TeardownStatus::Completed);
    assert_eq!(h.executor.count("cloud-init"), 1);
    assert_eq!(h.provisioner.destroys().len(), 1);
}

#[tokio::test]
async fn test_missing_output_is_error_expectation() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed("minimal", Preset::Minimal).without_output("ami_id"),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let ami = report
        .expectations
        .iter()
        .find(|e| e.subject == "output:ami_id")
        .unwrap();
    assert_eq!(ami.outcome, ProbeOutcome::Error);
    assert!(ami.detail.as_deref().unwrap().contains("not found"));
    assert_eq!(report.outcome, ScenarioOutcome::Fail);
    assert_eq!(report.final_state, ScenarioState::TornDown);
}

#[tokio::test]
async fn test_wrong_tag_is_fail_expectation() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed("minimal", Preset::Minimal).with_tag("FIPS", "disabled"),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let fips = report
        .expectations
        .iter()
        .find(|e| e.subject == "tag:FIPS")
        .unwrap();
    assert_eq!(fips.outcome, ProbeOutcome::Fail);
    assert_eq!(report.outcome, ScenarioOutcome::Fail);
}

#[tokio::test]
async fn test_tag_lookup_failure_errors_every_tag_expectation() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::deployed("minimal", Preset::Minimal).tags_unavailable(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let tags: Vec<_> = report
        .expectations
        .iter()
        .filter(|e| e.subject.starts_with("tag:"))
        .collect();
    assert_eq!(tags.len(), 5);
    assert!(tags.iter().all(|e| e.outcome == ProbeOutcome::Error));
    // Probes are unaffected by metadata trouble.
    assert!(report.suites.iter().all(|s| s.passed()));
}

#[tokio::test]
async fn test_no_tag_expectations_skips_tag_lookup() {
    let h = Harness::new(
        MockProvisioner::new(),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass);
    assert!(report.expectations.is_empty());
    assert_eq!(h.inventory.tag_lookups(), 0);
}

#[tokio::test]
async fn test_readiness_runs_before_any_probe() {
    let h = compliant_harness("minimal", Preset::Minimal);
    h.orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let commands = h.executor.commands();
    assert!(commands[0].starts_with("cloud-init"), "got: {commands:?}");
    assert_eq!(h.executor.count("cloud-init"), 1);
}

#[tokio::test]
async fn test_reporter_sees_lifecycle_in_order() {
    let h = compliant_harness("minimal", Preset::Minimal);
    h.orchestrator()
        .run_scenario(&preset_scenario("minimal", Preset::Minimal))
        .await;

    let events = h.reporter.events();
    let position = |needle: &str| {
        events
            .iter()
            .position(|e| e.contains(needle))
            .unwrap_or_else(|| panic!("no event containing {needle:?} in {events:?}"))
    };
    assert!(position("provisioning...") < position("provisioned i-minimal"));
    assert!(position("provisioned i-minimal") < position("ready after 1 attempt"));
    assert!(position("ready after") < position("security suite passed"));
    assert!(position("metadata suite passed") < position("torn down"));
}

#[tokio::test(start_paused = true)]
async fn test_slow_create_is_awaited_before_verification() {
    let h = Harness::new(
        MockProvisioner::new().with_create_delay(Duration::from_secs(600)),
        ScriptedExecutor::compliant(),
        MockInventory::new(),
    );

    let report = h
        .orchestrator()
        .run_scenario(&probes_only("minimal", Preset::Minimal))
        .await;

    assert_eq!(report.outcome, ScenarioOutcome::Pass);
    assert_eq!(h.provisioner.destroys().len(), 1);
}
