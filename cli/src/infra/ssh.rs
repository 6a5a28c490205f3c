//! Infrastructure implementation of the `RemoteExecutor` port.
//!
//! Delegates to the system OpenSSH client through a `CommandRunner`.
//! Targets are ephemeral, so host keys are neither checked nor recorded.

use std::time::Duration;

use async_trait::async_trait;

use crate::application::ports::{CommandRunner, RemoteExecutor};
use crate::domain::config::SshConfig;
use crate::domain::{CommandOutput, CommandTimeout, Target, TransportError};

/// Exit status the ssh client reserves for its own failures.
const SSH_CLIENT_ERROR: i32 = 255;

#[cfg(windows)]
const DEVNULL: &str = "NUL";
#[cfg(not(windows))]
const DEVNULL: &str = "/dev/null";

/// Runs probe commands over `ssh` in batch mode.
pub struct SshExecutor<R: CommandRunner> {
    runner: R,
    settings: SshConfig,
    timeout: Duration,
}

impl<R: CommandRunner> SshExecutor<R> {
    /// `timeout` bounds each remote command, connection included.
    pub fn new(runner: R, settings: SshConfig, timeout: Duration) -> Self {
        Self {
            runner,
            settings,
            timeout,
        }
    }

    /// Full `ssh` argument list for one command on one target.
    #[must_use]
    pub fn args(&self, target: &Target, command: &str) -> Vec<String> {
        let mut args = vec!["-p".to_string(), self.settings.port.to_string()];
        if let Some(key) = target
            .credential
            .private_key
            .as_ref()
            .or(self.settings.private_key.as_ref())
        {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        for opt in [
            "StrictHostKeyChecking=no".to_string(),
            format!("UserKnownHostsFile={DEVNULL}"),
            "LogLevel=ERROR".to_string(),
            "BatchMode=yes".to_string(),
            format!("ConnectTimeout={}", self.settings.connect_timeout_secs),
        ]
        .into_iter()
        .chain(self.settings.options.iter().cloned())
        {
            args.push("-o".to_string());
            args.push(opt);
        }
        args.push(target.login());
        args.push(command.to_string());
        args
    }
}

#[async_trait]
impl<R: CommandRunner> RemoteExecutor for SshExecutor<R> {
    async fn execute(
        &self,
        target: &Target,
        command: &str,
    ) -> Result<CommandOutput, TransportError> {
        let args = self.args(target, command);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();

        let output = self
            .runner
            .run_with_timeout("ssh", &argv, self.timeout)
            .await
            .map_err(|e| match e.downcast_ref::<CommandTimeout>() {
                Some(t) => TransportError::Timeout { secs: t.secs },
                None => TransportError::Other(format!("{e:#}")),
            })?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        match output.status.code() {
            None => Err(TransportError::Terminated),
            Some(SSH_CLIENT_ERROR) => Err(TransportError::Unreachable {
                address: target.address.clone(),
                detail: stderr.trim().to_string(),
            }),
            Some(code) => Ok(CommandOutput::new(format!("{stdout}{stderr}"), code)),
        }
    }
}
