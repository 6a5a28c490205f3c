//! Application service: concurrent scenario execution.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::task::JoinError;
use vouch_common::{
    ProvisioningMetadata, RunSummary, ScenarioOutcome, ScenarioReport, ScenarioState,
    TeardownStatus,
};

use crate::application::services::orchestrator::{ScenarioOrchestrator, panic_message};
use crate::domain::Scenario;

/// Runs independent scenarios concurrently, one task each.
#[derive(Clone)]
pub struct ScenarioRunner {
    orchestrator: Arc<ScenarioOrchestrator>,
}

impl ScenarioRunner {
    #[must_use]
    pub fn new(orchestrator: ScenarioOrchestrator) -> Self {
        Self {
            orchestrator: Arc::new(orchestrator),
        }
    }

    /// Run a single scenario on the current task.
    pub async fn run_scenario(&self, scenario: &Scenario) -> ScenarioReport {
        self.orchestrator.run_scenario(scenario).await
    }

    /// Run every scenario concurrently and return reports in input order.
    ///
    /// A scenario whose task dies is reported `Failed` without affecting
    /// the others.
    pub async fn run_all(&self, scenarios: Vec<Scenario>) -> RunSummary {
        tracing::info!(count = scenarios.len(), "running scenarios");

        let handles: Vec<_> = scenarios
            .iter()
            .cloned()
            .map(|scenario| {
                let orchestrator = Arc::clone(&self.orchestrator);
                tokio::spawn(async move { orchestrator.run_scenario(&scenario).await })
            })
            .collect();

        let reports = scenarios
            .iter()
            .zip(join_all(handles).await)
            .map(|(scenario, joined)| match joined {
                Ok(report) => report,
                Err(e) => crashed(scenario, e),
            })
            .collect();

        RunSummary { reports }
    }
}

fn crashed(scenario: &Scenario, err: JoinError) -> ScenarioReport {
    let reason = if err.is_panic() {
        format!("scenario task panicked: {}", panic_message(err.into_panic().as_ref()))
    } else {
        "scenario task was cancelled".to_string()
    };
    tracing::error!(scenario = %scenario.name, %reason, "scenario task died");

    ScenarioReport {
        scenario: scenario.name.clone(),
        outcome: ScenarioOutcome::Failed,
        final_state: ScenarioState::Failed,
        teardown: TeardownStatus::Unknown,
        error: Some(reason),
        readiness_attempts: None,
        metadata: ProvisioningMetadata::default(),
        expectations: Vec::new(),
        suites: Vec::new(),
        started_at: Utc::now(),
        duration_ms: 0,
    }
}
