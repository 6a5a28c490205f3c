//! Bounded readiness polling.
//!
//! Imports only from `crate::domain` and `crate::application::ports`.

use std::future::Future;
use std::time::Duration;

use crate::application::ports::RemoteExecutor;
use crate::domain::{ReadinessTimeout, Target};

/// Where cloud-init writes the log worth reading when readiness fails.
pub const CLOUD_INIT_LOG: &str = "/var/log/cloud-init-output.log";

/// Successful readiness wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ready {
    /// Probe invocations used, including the passing one.
    pub attempts: u32,
}

/// Poll `probe` until it succeeds or `max_attempts` invocations are spent.
///
/// Sleeps `interval` between attempts, never after the last one.
/// `max_attempts == 0` is treated as 1. The probe's `Err` text becomes the
/// diagnostic reported on exhaustion.
///
/// # Errors
///
/// Returns [`ReadinessTimeout`] with the attempt count and last diagnostic
/// when no attempt succeeds.
pub async fn await_ready<'t, F, Fut>(
    target: &'t Target,
    mut probe: F,
    max_attempts: u32,
    interval: Duration,
) -> Result<Ready, ReadinessTimeout>
where
    F: FnMut(&'t Target) -> Fut,
    Fut: Future<Output = Result<(), String>>,
{
    let max_attempts = max_attempts.max(1);
    let mut last_diagnostic = String::new();

    for attempt in 1..=max_attempts {
        match probe(target).await {
            Ok(()) => {
                tracing::debug!(target_id = %target.id, attempt, "target ready");
                return Ok(Ready { attempts: attempt });
            }
            Err(diagnostic) => {
                tracing::debug!(
                    target_id = %target.id,
                    attempt,
                    max_attempts,
                    %diagnostic,
                    "target not ready"
                );
                last_diagnostic = diagnostic;
            }
        }
        if attempt < max_attempts {
            tokio::time::sleep(interval).await;
        }
    }

    Err(ReadinessTimeout {
        attempts: max_attempts,
        last_diagnostic,
    })
}

/// Run the readiness command once and map its exit code.
///
/// Follows `cloud-init status --wait` conventions:
/// - `0` → ready
/// - `1` → critical failure
/// - `2` → degraded (completed with non-fatal errors)
///
/// # Errors
///
/// Returns the diagnostic for any non-ready result, including transport
/// failures verbatim.
pub async fn readiness_signal(
    executor: &dyn RemoteExecutor,
    target: &Target,
    command: &str,
) -> Result<(), String> {
    let out = executor
        .execute(target, command)
        .await
        .map_err(|e| e.to_string())?;

    match out.exit_status {
        0 => Ok(()),
        1 => Err(format!(
            "cloud-init reported a critical failure (see {CLOUD_INIT_LOG})"
        )),
        2 => Err(format!(
            "cloud-init completed in a degraded state (see {CLOUD_INIT_LOG})"
        )),
        code => Err(format!("readiness command exited with unexpected code {code}")),
    }
}
