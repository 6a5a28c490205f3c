//! Application service: one scenario, provision to teardown.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.
//! All I/O is routed through injected port traits.
//!
//! Lifecycle: `Created → Provisioning → AwaitingReady → Verifying → TornDown`,
//! with `Failed` reachable from the first three. Once `create` returns a
//! target, `destroy` is called exactly once on every path, including
//! readiness timeout, cancellation and a panic inside verification.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures_util::FutureExt;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use vouch_common::{
    ExpectationResult, ProbeOutcome, ProvisioningMetadata, ScenarioOutcome, ScenarioReport,
    ScenarioState, SuiteReport, TeardownStatus,
};

use crate::application::ports::{
    InventoryReader, ProgressReporter, Provisioner, RemoteExecutor, TemplateSpec,
};
use crate::application::services::probe_runner::ProbeRunner;
use crate::application::services::readiness::{await_ready, readiness_signal};
use crate::application::services::suite::run_suite;
use crate::domain::{LookupErrors, Scenario, Target};

/// The external systems a scenario talks to.
#[derive(Clone)]
pub struct Collaborators {
    pub provisioner: Arc<dyn Provisioner>,
    pub executor: Arc<dyn RemoteExecutor>,
    pub inventory: Arc<dyn InventoryReader>,
}

/// Drives scenarios through their lifecycle. Shareable across tasks; holds
/// no per-scenario state.
pub struct ScenarioOrchestrator {
    collaborators: Collaborators,
    reporter: Arc<dyn ProgressReporter>,
    cancel: CancellationToken,
    admission: Option<Semaphore>,
}

/// Everything observed about a scenario so far. Lives outside the
/// verification future so partial results survive a panic.
struct Findings {
    state: ScenarioState,
    metadata: ProvisioningMetadata,
    expectations: Vec<ExpectationResult>,
    suites: Vec<SuiteReport>,
    readiness_attempts: Option<u32>,
}

impl Findings {
    fn new() -> Self {
        Self {
            state: ScenarioState::Created,
            metadata: ProvisioningMetadata::default(),
            expectations: Vec::new(),
            suites: Vec::new(),
            readiness_attempts: None,
        }
    }

    fn enter(&mut self, scenario: &str, state: ScenarioState) {
        tracing::info!(scenario, from = ?self.state, to = ?state, "scenario state");
        self.state = state;
    }

    fn all_passed(&self) -> bool {
        self.suites.iter().all(SuiteReport::passed)
            && self.expectations.iter().all(|e| e.outcome.is_pass())
    }
}

impl ScenarioOrchestrator {
    #[must_use]
    pub fn new(collaborators: Collaborators, reporter: Arc<dyn ProgressReporter>) -> Self {
        Self {
            collaborators,
            reporter,
            cancel: CancellationToken::new(),
            admission: None,
        }
    }

    /// Stop waiting and verifying once `token` fires. Teardown still runs.
    #[must_use]
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Bound concurrent `create` calls. Only provisioning holds a permit.
    #[must_use]
    pub fn with_max_concurrent_provisions(mut self, limit: Option<usize>) -> Self {
        self.admission = limit.map(|n| Semaphore::new(n.max(1)));
        self
    }

    /// Run one scenario to completion. Never returns an error: every
    /// failure is folded into the report.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        let started_at = Utc::now();
        let clock = Instant::now();
        let name = scenario.name.as_str();
        let mut findings = Findings::new();

        findings.enter(name, ScenarioState::Provisioning);
        let mut target = match self.provision(scenario).await {
            Ok(target) => target,
            Err(reason) => {
                self.reporter.warn(&format!("{name}: {reason}"));
                findings.enter(name, ScenarioState::Failed);
                return finish(
                    scenario,
                    findings,
                    TeardownStatus::NotRequired,
                    Some(reason),
                    started_at,
                    clock,
                );
            }
        };
        self.reporter.success(&format!(
            "{name}: provisioned {} at {}",
            target.id, target.address
        ));

        let verified = AssertUnwindSafe(self.verify(scenario, &mut target, &mut findings))
            .catch_unwind()
            .await;
        let error = match verified {
            Ok(Ok(())) => None,
            Ok(Err(reason)) => Some(reason),
            Err(panic) => {
                let reason = format!("verification panicked: {}", panic_message(panic.as_ref()));
                tracing::error!(scenario = name, %reason, "scenario panicked");
                Some(reason)
            }
        };
        if let Some(reason) = &error {
            self.reporter.warn(&format!("{name}: {reason}"));
        }

        let teardown = self.teardown(name, &target).await;
        let state = if error.is_some() || teardown.leaked() {
            ScenarioState::Failed
        } else {
            ScenarioState::TornDown
        };
        findings.enter(name, state);

        finish(scenario, findings, teardown, error, started_at, clock)
    }

    async fn provision(&self, scenario: &Scenario) -> Result<Target, String> {
        let name = scenario.name.as_str();

        let _permit = match &self.admission {
            Some(semaphore) => tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Err("cancelled before provisioning".into()),
                permit = semaphore.acquire() => permit.ok(),
            },
            None => None,
        };
        if self.cancel.is_cancelled() {
            return Err("cancelled before provisioning".into());
        }

        self.reporter.step(&format!("{name}: provisioning..."));
        let spec = TemplateSpec {
            scenario: name,
            root: &scenario.template.root,
            dir: &scenario.template.dir,
            vars: &scenario.vars,
        };
        // `create` is never raced with cancellation; whatever it returns must
        // reach `destroy`.
        self.collaborators
            .provisioner
            .create(&spec)
            .await
            .map_err(|e| format!("provisioning failed: {e}"))
    }

    async fn verify(
        &self,
        scenario: &Scenario,
        target: &mut Target,
        findings: &mut Findings,
    ) -> Result<(), String> {
        let name = scenario.name.as_str();

        self.collect_metadata(scenario, target, findings).await;

        findings.enter(name, ScenarioState::AwaitingReady);
        self.reporter.step(&format!("{name}: waiting for target to become ready..."));
        let policy = &scenario.readiness;
        let executor: &dyn RemoteExecutor = self.collaborators.executor.as_ref();
        let command = policy.command.as_str();
        let waited = tokio::select! {
            biased;
            () = self.cancel.cancelled() => None,
            r = await_ready(
                target,
                move |t| readiness_signal(executor, t, command),
                policy.max_attempts,
                policy.interval(),
            ) => Some(r),
        };
        match waited {
            None => return Err("cancelled while awaiting readiness".into()),
            Some(Ok(ready)) => {
                findings.readiness_attempts = Some(ready.attempts);
                target.mark_ready();
                self.reporter.success(&format!(
                    "{name}: ready after {} attempt(s)",
                    ready.attempts
                ));
            }
            Some(Err(timeout)) => {
                findings.readiness_attempts = Some(timeout.attempts);
                target.mark_failed();
                return Err(timeout.to_string());
            }
        }

        findings.enter(name, ScenarioState::Verifying);
        let runner = ProbeRunner::new(Arc::clone(&self.collaborators.executor));
        for suite in &scenario.suites {
            if self.cancel.is_cancelled() {
                return Err("cancelled during verification".into());
            }
            let report = run_suite(suite, target, &runner, self.reporter.as_ref(), name).await;
            findings.suites.push(report);
        }
        Ok(())
    }

    /// Gather declared outputs and tags, then judge expectations. Lookup
    /// failures become `Error` expectation results.
    async fn collect_metadata(
        &self,
        scenario: &Scenario,
        target: &Target,
        findings: &mut Findings,
    ) {
        let inventory = self.collaborators.inventory.as_ref();
        let mut errors = LookupErrors::default();
        let metadata = &mut findings.metadata;
        metadata.instance_id = Some(target.id.clone());
        metadata.address = Some(target.address.clone());

        for output in scenario.expect.outputs.keys() {
            match inventory.get_output(&target.handle, output).await {
                Ok(value) => {
                    metadata.outputs.insert(output.clone(), value);
                }
                Err(e) => {
                    tracing::warn!(
                        scenario = %scenario.name,
                        output,
                        error = %e,
                        "output lookup failed"
                    );
                    errors.outputs.insert(output.clone(), e.to_string());
                }
            }
        }

        if !scenario.expect.tags.is_empty() {
            match inventory.get_tags(&target.id).await {
                Ok(tags) => metadata.tags = tags,
                Err(e) => {
                    tracing::warn!(scenario = %scenario.name, error = %e, "tag lookup failed");
                    errors.tags = Some(e.to_string());
                }
            }
        }

        findings.expectations = scenario.expect.evaluate(&findings.metadata, &errors);
        let failed = findings
            .expectations
            .iter()
            .filter(|e| e.outcome != ProbeOutcome::Pass)
            .count();
        if failed > 0 {
            self.reporter.warn(&format!(
                "{}: {failed} metadata expectation(s) not met",
                scenario.name
            ));
        }
    }

    async fn teardown(&self, name: &str, target: &Target) -> TeardownStatus {
        self.reporter.step(&format!("{name}: tearing down {}...", target.id));
        match self.collaborators.provisioner.destroy(target).await {
            Ok(()) => {
                tracing::info!(scenario = name, target_id = %target.id, "target destroyed");
                self.reporter.success(&format!("{name}: torn down"));
                TeardownStatus::Completed
            }
            Err(e) => {
                tracing::error!(
                    scenario = name,
                    target_id = %target.id,
                    error = %e,
                    "teardown failed"
                );
                self.reporter.warn(&format!(
                    "{name}: teardown failed, resources may have leaked: {e}"
                ));
                TeardownStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

fn finish(
    scenario: &Scenario,
    findings: Findings,
    teardown: TeardownStatus,
    error: Option<String>,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
) -> ScenarioReport {
    let outcome = if findings.state == ScenarioState::Failed {
        ScenarioOutcome::Failed
    } else if findings.all_passed() {
        ScenarioOutcome::Pass
    } else {
        ScenarioOutcome::Fail
    };
    tracing::info!(scenario = %scenario.name, outcome = outcome.label(), "scenario finished");

    ScenarioReport {
        scenario: scenario.name.clone(),
        outcome,
        final_state: findings.state,
        teardown,
        error,
        readiness_attempts: findings.readiness_attempts,
        metadata: findings.metadata,
        expectations: findings.expectations,
        suites: findings.suites,
        started_at,
        duration_ms: u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX),
    }
}

/// Best-effort text of a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
