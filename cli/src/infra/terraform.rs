//! Infrastructure implementation of the `Provisioner` port.
//!
//! `TerraformProvisioner<R>` routes all terraform CLI calls through a
//! `CommandRunner`. Each `create` works on a private copy of the template
//! root, so concurrent scenarios never share state files.
//!
//! `init`, `apply` and `destroy` are retried a bounded number of times when
//! terraform fails with one of the known transient errors in
//! [`RETRYABLE_ERRORS`]. Any other failure is returned on the first attempt.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::{LazyLock, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::RegexSet;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::OnceCell;

use crate::application::ports::{CommandRunner, Provisioner, TemplateSpec};
use crate::domain::{CommandTimeout, Credential, DestroyError, ProvisionError, Target};

pub const TERRAFORM_MIN_VERSION: semver::Version = semver::Version::new(1, 3, 0);

/// Variables file terraform loads automatically from the working directory.
pub const TFVARS_FILE: &str = "vouch.auto.tfvars.json";

/// Outputs every template must declare.
pub const INSTANCE_ID_OUTPUT: &str = "instance_id";
pub const ADDRESS_OUTPUT: &str = "public_ip";

const VERSION_TIMEOUT: Duration = Duration::from_secs(30);

/// Extra attempts for a step that failed with a retryable error.
pub const MAX_RETRIES: u32 = 3;
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Terraform failures caused by flaky networks or API rate limits, not by
/// the template. Matched against stderr and stdout of a failed step.
pub const RETRYABLE_ERRORS: &[&str] = &[
    r"(?i)read: connection reset by peer",
    r"(?i)TLS handshake timeout",
    r"(?i)Client\.Timeout exceeded while awaiting headers",
    r"(?i)Error installing provider.*(timeout|connection reset)",
    r"(?i)Failed to install provider.*(timeout|connection reset|429)",
    r"(?i)Failed to load (state|backend).*(timeout|TLS handshake)",
    r"(?i)RequestError: send request failed",
    r"(?i)Throttling: Rate exceeded",
    r"(?i)RequestLimitExceeded",
    r"(?i)429 Too Many Requests",
    r"(?i)ssh_exchange_identification.*Connection closed by remote host",
    r"(?i)Could not download module.*returned error: 429",
];

static RETRYABLE: LazyLock<RegexSet> = LazyLock::new(|| {
    // Safety: the patterns are compile-time constants; cannot fail.
    #[allow(clippy::expect_used)]
    RegexSet::new(RETRYABLE_ERRORS).expect("valid retryable patterns")
});

/// Whether a failed terraform run is worth repeating unchanged.
pub fn is_retryable(output: &Output) -> bool {
    RETRYABLE.is_match(&String::from_utf8_lossy(&output.stderr))
        || RETRYABLE.is_match(&String::from_utf8_lossy(&output.stdout))
}

/// A staged copy of a template root.
enum Workspace {
    Temp(TempDir),
    /// Kept on disk after a failed destroy so state survives for a retry.
    Kept(PathBuf),
}

impl Workspace {
    fn path(&self) -> &Path {
        match self {
            Self::Temp(dir) => dir.path(),
            Self::Kept(path) => path,
        }
    }

    fn keep(self) -> PathBuf {
        match self {
            Self::Temp(dir) => dir.keep(),
            Self::Kept(path) => path,
        }
    }
}

/// Infrastructure adapter that routes all terraform CLI calls through a `CommandRunner`.
///
/// Generic over `R: CommandRunner` so that tests can inject a mock runner
/// without spawning real processes.
pub struct TerraformProvisioner<R: CommandRunner> {
    runner: R,
    timeout: Duration,
    credential: Credential,
    /// Live workspaces keyed by target handle (the terraform working dir).
    workspaces: Mutex<HashMap<String, Workspace>>,
    version_ok: OnceCell<()>,
    retries: u32,
    retry_delay: Duration,
}

impl<R: CommandRunner> TerraformProvisioner<R> {
    /// `timeout` bounds each of init, apply and destroy.
    pub fn new(runner: R, timeout: Duration, credential: Credential) -> Self {
        Self {
            runner,
            timeout,
            credential,
            workspaces: Mutex::new(HashMap::new()),
            version_ok: OnceCell::new(),
            retries: MAX_RETRIES,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override how often and how far apart retryable failures are repeated.
    #[must_use]
    pub fn with_retries(mut self, retries: u32, delay: Duration) -> Self {
        self.retries = retries;
        self.retry_delay = delay;
        self
    }

    async fn check_prerequisites(&self) -> Result<(), ProvisionError> {
        self.version_ok
            .get_or_try_init(|| async {
                let output = self
                    .runner
                    .run_with_timeout("terraform", &["version", "-json"], VERSION_TIMEOUT)
                    .await
                    .map_err(|e| ProvisionError::ToolUnavailable(format!("terraform: {e:#}")))?;
                if let Some(v) = parse_version(&output.stdout)
                    && v < TERRAFORM_MIN_VERSION
                {
                    return Err(ProvisionError::ToolUnavailable(format!(
                        "terraform {v} is older than the required {TERRAFORM_MIN_VERSION}"
                    )));
                }
                Ok::<(), ProvisionError>(())
            })
            .await
            .map(|_| ())
    }

    async fn terraform(&self, workdir: &Path, args: &[&str]) -> Result<Output> {
        let chdir = format!("-chdir={}", workdir.display());
        let mut full = vec![chdir.as_str()];
        full.extend_from_slice(args);
        self.runner
            .run_with_timeout("terraform", &full, self.timeout)
            .await
    }

    /// Like `terraform`, repeating runs that fail with a retryable error.
    /// The last output is returned whether or not it succeeded.
    async fn terraform_retrying(&self, workdir: &Path, args: &[&str]) -> Result<Output> {
        let mut attempt = 0;
        loop {
            let output = self.terraform(workdir, args).await?;
            if output.status.success() || attempt >= self.retries || !is_retryable(&output) {
                return Ok(output);
            }
            attempt += 1;
            tracing::warn!(
                command = args.first().copied().unwrap_or_default(),
                attempt,
                max = self.retries,
                detail = %failure_detail(&output),
                "transient terraform error, retrying"
            );
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Run one terraform step, mapping spawn errors, timeouts and non-zero
    /// exits to `StepFailed`.
    async fn step(
        &self,
        step: &'static str,
        workdir: &Path,
        args: &[&str],
    ) -> Result<Output, ProvisionError> {
        tracing::info!(step, workdir = %workdir.display(), "terraform");
        let output = self
            .terraform_retrying(workdir, args)
            .await
            .map_err(|e| ProvisionError::StepFailed {
                step,
                detail: runner_detail(&e),
            })?;
        if !output.status.success() {
            return Err(ProvisionError::StepFailed {
                step,
                detail: failure_detail(&output),
            });
        }
        Ok(output)
    }

    async fn destroy_workdir(&self, workdir: &Path) -> Result<(), String> {
        let output = self
            .terraform_retrying(
                workdir,
                &["destroy", "-input=false", "-auto-approve", "-no-color"],
            )
            .await
            .map_err(|e| runner_detail(&e))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(failure_detail(&output))
        }
    }

    /// Destroy after a failed apply or missing output, then surface `err`.
    async fn abandon(
        &self,
        workspace: Workspace,
        workdir: &Path,
        err: ProvisionError,
    ) -> ProvisionError {
        if let Err(detail) = self.destroy_workdir(workdir).await {
            let kept = workspace.keep();
            tracing::error!(
                workdir = %workdir.display(),
                state = %kept.display(),
                %detail,
                "cleanup after failed provisioning did not complete"
            );
            return ProvisionError::StepFailed {
                step: "terraform destroy",
                detail: format!(
                    "{err}; cleanup also failed, state kept at {}: {detail}",
                    kept.display()
                ),
            };
        }
        err
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Workspace>> {
        self.workspaces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<R: CommandRunner> Provisioner for TerraformProvisioner<R> {
    async fn create(&self, spec: &TemplateSpec<'_>) -> Result<Target, ProvisionError> {
        self.check_prerequisites().await?;

        let source = spec.root.join(spec.dir);
        if !source.is_dir() {
            return Err(ProvisionError::TemplateNotFound(source));
        }

        let root = spec.root.to_path_buf();
        let prefix = format!("vouch-{}-", spec.scenario);
        let staged = tokio::task::spawn_blocking(move || stage_template(&root, &prefix))
            .await
            .map_err(|e| ProvisionError::Interrupted(e.to_string()))?
            .map_err(|e| ProvisionError::StepFailed {
                step: "stage template",
                detail: format!("{e:#}"),
            })?;
        let workspace = Workspace::Temp(staged);
        let workdir = workspace.path().join(spec.dir);

        let vars =
            serde_json::to_vec_pretty(spec.vars).map_err(|e| ProvisionError::StepFailed {
                step: "write variables",
                detail: e.to_string(),
            })?;
        tokio::fs::write(workdir.join(TFVARS_FILE), vars)
            .await
            .map_err(|e| ProvisionError::StepFailed {
                step: "write variables",
                detail: e.to_string(),
            })?;

        self.step(
            "terraform init",
            &workdir,
            &["init", "-input=false", "-no-color"],
        )
        .await?;

        if let Err(e) = self
            .step(
                "terraform apply",
                &workdir,
                &["apply", "-input=false", "-auto-approve", "-no-color"],
            )
            .await
        {
            return Err(self.abandon(workspace, &workdir, e).await);
        }

        let outputs = match self.step("terraform output", &workdir, &["output", "-json"]).await {
            Ok(out) => parse_outputs(&out.stdout),
            Err(e) => return Err(self.abandon(workspace, &workdir, e).await),
        };
        let (Some(id), Some(address)) = (
            outputs.get(INSTANCE_ID_OUTPUT).filter(|v| !v.is_empty()),
            outputs.get(ADDRESS_OUTPUT).filter(|v| !v.is_empty()),
        ) else {
            let missing = if outputs.get(INSTANCE_ID_OUTPUT).is_none_or(String::is_empty) {
                INSTANCE_ID_OUTPUT
            } else {
                ADDRESS_OUTPUT
            };
            let err = ProvisionError::MissingOutput(missing.to_string());
            return Err(self.abandon(workspace, &workdir, err).await);
        };

        let handle = workdir.display().to_string();
        let target = Target::new(id.clone(), address.clone(), self.credential.clone(), &handle);
        self.lock().insert(handle, workspace);
        tracing::info!(scenario = spec.scenario, target_id = %target.id, "provisioned");
        Ok(target)
    }

    async fn destroy(&self, target: &Target) -> Result<(), DestroyError> {
        let Some(workspace) = self.lock().remove(&target.handle) else {
            tracing::debug!(handle = %target.handle, "nothing to destroy");
            return Ok(());
        };

        let workdir = PathBuf::from(&target.handle);
        match self.destroy_workdir(&workdir).await {
            Ok(()) => {
                if let Workspace::Kept(path) = &workspace
                    && let Err(e) = tokio::fs::remove_dir_all(path).await
                {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "could not remove workspace"
                    );
                }
                Ok(())
            }
            Err(detail) => {
                let kept = workspace.keep();
                self.lock()
                    .insert(target.handle.clone(), Workspace::Kept(kept.clone()));
                Err(DestroyError::StepFailed {
                    handle: target.handle.clone(),
                    detail: format!("{detail} (state kept at {})", kept.display()),
                })
            }
        }
    }
}

/// Copy `root` into a fresh temporary directory, skipping hidden entries
/// and local state files.
///
/// # Errors
///
/// Returns an error if the temporary directory cannot be created or any
/// file fails to copy.
pub fn stage_template(root: &Path, prefix: &str) -> Result<TempDir> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .context("cannot create temporary directory")?;
    copy_tree(root, dir.path())?;
    Ok(dir)
}

fn copy_tree(from: &Path, to: &Path) -> Result<()> {
    std::fs::create_dir_all(to).with_context(|| format!("cannot create {}", to.display()))?;
    let entries =
        std::fs::read_dir(from).with_context(|| format!("cannot read {}", from.display()))?;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name();
        let name_str = name.to_string_lossy();
        if name_str.starts_with('.') || name_str.starts_with("terraform.tfstate") {
            continue;
        }
        let kind = entry.file_type()?;
        let dest = to.join(&name);
        if kind.is_dir() {
            copy_tree(&entry.path(), &dest)?;
        } else if kind.is_file() {
            std::fs::copy(entry.path(), &dest)
                .with_context(|| format!("cannot copy {}", entry.path().display()))?;
        }
    }
    Ok(())
}

/// Parse `terraform version -json`.
fn parse_version(stdout: &[u8]) -> Option<semver::Version> {
    let json: Value = serde_json::from_slice(stdout).ok()?;
    let raw = json.get("terraform_version")?.as_str()?;
    semver::Version::parse(raw).ok()
}

/// Flatten `terraform output -json` into name → display text.
pub(crate) fn parse_outputs(stdout: &[u8]) -> HashMap<String, String> {
    let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(stdout) else {
        return HashMap::new();
    };
    map.into_iter()
        .filter_map(|(name, entry)| entry.get("value").map(|v| (name, output_text(v))))
        .collect()
}

/// Strings verbatim, everything else as compact JSON.
pub(crate) fn output_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

pub(crate) fn runner_detail(err: &anyhow::Error) -> String {
    match err.downcast_ref::<CommandTimeout>() {
        Some(t) => t.to_string(),
        None => format!("{err:#}"),
    }
}

/// Last lines of stderr (or stdout when stderr is empty) and the exit code.
pub(crate) fn failure_detail(output: &Output) -> String {
    const TAIL: usize = 20;
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(TAIL)..].join("\n");
    match output.status.code() {
        Some(code) if tail.is_empty() => format!("exit code {code}"),
        Some(code) => format!("exit code {code}: {tail}"),
        None => format!("terminated by signal: {tail}"),
    }
}
