//! Property-based tests for readiness bounds, suite coverage and input
//! validation.
//!
//! Uses `proptest` to verify invariants across many random inputs.

#![allow(clippy::expect_used)]

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use proptest::prelude::*;
use vouch_cli::application::services::await_ready;
use vouch_cli::domain::scenario::validate_scenario_name;
use vouch_cli::domain::{
    CommandOutput, Predicate, Preset, Probe, Scenario, SuiteKind, TemplateLocation, parse_var,
};
use vouch_common::TeardownStatus;

use crate::mocks::{
    Harness, MockInventory, MockProvisioner, ScriptedExecutor, compliant_host, quick_readiness,
    target,
};

/// Current-thread runtime with a paused clock, so readiness intervals cost
/// nothing.
fn paused_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("tokio runtime")
}

// ============================================================================
// await_ready() bounds
// ============================================================================

proptest! {
    /// k failures followed by a success take exactly k+1 probes when the
    /// attempt limit allows it.
    #[test]
    fn prop_k_failures_then_ready_takes_k_plus_one_probes(
        k in 0u32..15,
        slack in 1u32..5,
    ) {
        let max_attempts = k + slack;
        let calls = AtomicU32::new(0);
        let t = target("prop");

        let result = paused_runtime().block_on(await_ready(
            &t,
            |_| {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                std::future::ready(if n > k { Ok(()) } else { Err(format!("attempt {n}")) })
            },
            max_attempts,
            Duration::from_secs(15),
        ));

        let ready = result.expect("ready within attempt limit");
        prop_assert_eq!(ready.attempts, k + 1);
        prop_assert_eq!(calls.load(Ordering::SeqCst), k + 1);
    }

    /// A target that never becomes ready is probed exactly `max_attempts`
    /// times, never more.
    #[test]
    fn prop_exhaustion_probes_exactly_max_attempts(max_attempts in 1u32..30) {
        let calls = AtomicU32::new(0);
        let t = target("prop");

        let result = paused_runtime().block_on(await_ready(
            &t,
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                std::future::ready(Err("status: running".to_string()))
            },
            max_attempts,
            Duration::from_secs(15),
        ));

        let timeout = result.expect_err("never ready");
        prop_assert_eq!(timeout.attempts, max_attempts);
        prop_assert_eq!(calls.load(Ordering::SeqCst), max_attempts);
        prop_assert_eq!(timeout.last_diagnostic, "status: running");
    }
}

// ============================================================================
// Suite coverage
// ============================================================================

fn suite_selection() -> impl Strategy<Value = Vec<SuiteKind>> {
    proptest::sample::subsequence(SuiteKind::ALL.to_vec(), 1..=SuiteKind::ALL.len())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Every probe of every selected suite produces exactly one result, in
    /// declaration order, and the target is destroyed exactly once.
    #[test]
    fn prop_every_probe_reports_once_in_order(kinds in suite_selection()) {
        let suites: Vec<_> = kinds.iter().map(|k| k.suite()).collect();
        let expected: Vec<String> = suites
            .iter()
            .flat_map(|s| s.probes.iter().map(|p| p.name.clone()))
            .collect();
        let scenario = Scenario::new("prop", TemplateLocation::new("/t", "."))
            .with_suites(suites)
            .with_readiness(quick_readiness(1));
        let h = Harness::new(
            MockProvisioner::new(),
            ScriptedExecutor::compliant(),
            MockInventory::new(),
        );

        let report = paused_runtime().block_on(h.orchestrator().run_scenario(&scenario));

        let got: Vec<String> = report.probe_results().map(|r| r.probe.clone()).collect();
        prop_assert_eq!(got, expected);
        prop_assert_eq!(report.probe_count(), scenario.probe_count());
        prop_assert_eq!(report.teardown, TeardownStatus::Completed);
        prop_assert_eq!(h.provisioner.destroys().len(), 1);
    }

    /// Whatever the probe outcomes, teardown happens exactly once.
    #[test]
    fn prop_teardown_once_regardless_of_outcomes(fail_every in 1usize..6) {
        let counter = std::sync::atomic::AtomicUsize::new(0);
        let h = Harness::new(
            MockProvisioner::new(),
            ScriptedExecutor::new(move |cmd| {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                if n > 0 && n % fail_every == 0 {
                    Ok(CommandOutput::new("unexpected", 1))
                } else {
                    compliant_host(cmd)
                }
            }),
            MockInventory::new(),
        );
        let suites = Preset::Full.suites().into_iter().map(|k| k.suite()).collect();
        let scenario = Scenario::new("prop", TemplateLocation::new("/t", "."))
            .with_suites(suites)
            .with_readiness(quick_readiness(1));

        let report = paused_runtime().block_on(h.orchestrator().run_scenario(&scenario));

        prop_assert_eq!(h.provisioner.destroys().len(), 1);
        prop_assert_eq!(report.probe_count(), 10);
    }
}

// ============================================================================
// Input validation
// ============================================================================

proptest! {
    /// DNS-label shaped names are accepted.
    #[test]
    fn prop_dns_label_names_accepted(name in "[a-z0-9]([a-z0-9-]{0,20}[a-z0-9])?") {
        prop_assert!(validate_scenario_name(&name).is_ok(), "rejected: {name}");
    }

    /// Uppercase letters and underscores are never accepted.
    #[test]
    fn prop_names_with_invalid_chars_rejected(
        prefix in "[a-z]{0,5}",
        bad in "[A-Z_]",
        suffix in "[a-z]{0,5}",
    ) {
        let name = format!("{prefix}{bad}{suffix}");
        prop_assert!(validate_scenario_name(&name).is_err(), "accepted: {name}");
    }

    /// Plain words survive `--var` parsing as strings under the trimmed key.
    #[test]
    fn prop_var_words_are_strings(key in "[a-z_]{1,12}", value in "[a-z]{1,12}") {
        prop_assume!(!["true", "false", "null"].contains(&value.as_str()));
        let (k, v) = parse_var(&format!(" {key} ={value}")).expect("valid var");
        prop_assert_eq!(k, key);
        prop_assert_eq!(v, serde_json::Value::String(value));
    }

    /// Custom probes with an empty command never validate.
    #[test]
    fn prop_blank_command_probe_is_invalid(name in "[a-z_]{1,12}", blank in "[ \t]{0,4}") {
        let probe = Probe::new(&name, &blank, Predicate::Contains("x".into()));
        prop_assert!(probe.validate().is_err());
    }
}
