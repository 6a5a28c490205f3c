//! Shared test helpers: a scripted `CommandRunner` and output constructors.

#![allow(dead_code, clippy::expect_used)]

use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use vouch_cli::application::ports::CommandRunner;

// ── Cross-platform ExitStatus construction ───────────────────────────────────

/// Build an `ExitStatus` from a logical exit code (0 = success, non-zero = failure).
///
/// On Unix the raw wait-status encodes the exit code in bits 8–15, so we shift.
/// On Windows `ExitStatusExt::from_raw` takes the exit code directly.
#[cfg(unix)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
pub fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    #[allow(clippy::cast_sign_loss)]
    ExitStatus::from_raw(code as u32)
}

// ── Output constructors ──────────────────────────────────────────────────────

pub fn ok_output(stdout: &[u8]) -> Output {
    Output {
        status: exit_status(0),
        stdout: stdout.to_vec(),
        stderr: Vec::new(),
    }
}

pub fn err_output(code: i32, stderr: &[u8]) -> Output {
    Output {
        status: exit_status(code),
        stdout: Vec::new(),
        stderr: stderr.to_vec(),
    }
}

/// `terraform output -json` for a template exposing an instance id and IP.
pub fn terraform_outputs(instance_id: &str, public_ip: &str) -> Vec<u8> {
    serde_json::json!({
        "instance_id": { "sensitive": false, "type": "string", "value": instance_id },
        "public_ip": { "sensitive": false, "type": "string", "value": public_ip },
    })
    .to_string()
    .into_bytes()
}

// ── ScriptedRunner ───────────────────────────────────────────────────────────

type Script = dyn Fn(&str, &[String]) -> Result<Output> + Send + Sync;

/// A `CommandRunner` that records every `(program, args)` call and answers
/// through a closure over the same pair.
///
/// Cloning shares the call log, so a test can keep a handle after moving
/// the runner into an adapter.
#[derive(Clone)]
pub struct ScriptedRunner {
    calls: Arc<Mutex<Vec<(String, Vec<String>)>>>,
    script: Arc<Script>,
}

impl ScriptedRunner {
    pub fn new(script: impl Fn(&str, &[String]) -> Result<Output> + Send + Sync + 'static) -> Self {
        Self {
            calls: Arc::new(Mutex::new(Vec::new())),
            script: Arc::new(script),
        }
    }

    /// Snapshot of all recorded calls.
    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().expect("mutex poisoned").clone()
    }

    /// Recorded calls whose arguments contain `arg`.
    pub fn calls_with(&self, arg: &str) -> Vec<Vec<String>> {
        self.calls()
            .into_iter()
            .filter(|(_, args)| args.iter().any(|a| a == arg))
            .map(|(_, args)| args)
            .collect()
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, program: &str, args: &[&str]) -> Result<Output> {
        let args: Vec<String> = args.iter().map(ToString::to_string).collect();
        self.calls
            .lock()
            .expect("mutex poisoned")
            .push((program.to_owned(), args.clone()));
        (self.script)(program, &args)
    }

    async fn run_with_timeout(
        &self,
        program: &str,
        args: &[&str],
        _timeout: Duration,
    ) -> Result<Output> {
        self.run(program, args).await
    }
}
