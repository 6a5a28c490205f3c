//! Single-probe execution.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::sync::Arc;

use vouch_common::ProbeResult;

use crate::application::ports::RemoteExecutor;
use crate::domain::{Probe, Target};

/// Executes one probe against one target and classifies the outcome.
///
/// Never retries. Transport failures become `Error` results, never `Err`.
#[derive(Clone)]
pub struct ProbeRunner {
    executor: Arc<dyn RemoteExecutor>,
}

impl ProbeRunner {
    #[must_use]
    pub fn new(executor: Arc<dyn RemoteExecutor>) -> Self {
        Self { executor }
    }

    pub async fn run(&self, target: &Target, probe: &Probe) -> ProbeResult {
        let out = match self.executor.execute(target, &probe.command).await {
            Ok(out) => out,
            Err(e) => {
                tracing::warn!(probe = %probe.name, error = %e, "probe transport failed");
                return ProbeResult::error(&probe.name, "", None, e.to_string());
            }
        };

        let verdict = probe.classify(&out);
        tracing::debug!(
            probe = %probe.name,
            outcome = verdict.outcome.label(),
            exit_status = out.exit_status,
            "probe finished"
        );

        ProbeResult {
            probe: probe.name.clone(),
            outcome: verdict.outcome,
            output: out.output,
            exit_status: Some(out.exit_status),
            detail: verdict.detail,
        }
    }
}
