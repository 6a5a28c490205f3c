//! The live remote resource under verification.

use std::path::PathBuf;

use serde::Serialize;

/// How a target authenticates remote commands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Credential {
    /// Login user, e.g. `rocky`.
    pub user: String,
    /// Private key file; `None` defers to the transport's own agent/config.
    pub private_key: Option<PathBuf>,
}

/// Readiness as last observed by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Readiness {
    Unknown,
    Ready,
    Failed,
}

/// Opaque handle to a provisioned instance.
///
/// Owned by the orchestrator that created it and released exactly once.
#[derive(Debug, Clone, Serialize)]
pub struct Target {
    /// Cloud instance identity, e.g. `i-0abc...`.
    pub id: String,
    /// Network address used by the remote executor.
    pub address: String,
    pub credential: Credential,
    /// Provisioner-specific handle used for teardown and output lookup.
    pub handle: String,
    readiness: Readiness,
}

impl Target {
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        address: impl Into<String>,
        credential: Credential,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            credential,
            handle: handle.into(),
            readiness: Readiness::Unknown,
        }
    }

    #[must_use]
    pub fn readiness(&self) -> Readiness {
        self.readiness
    }

    pub fn mark_ready(&mut self) {
        self.readiness = Readiness::Ready;
    }

    pub fn mark_failed(&mut self) {
        self.readiness = Readiness::Failed;
    }

    /// `user@address`, as used by ssh-style transports.
    #[must_use]
    pub fn login(&self) -> String {
        format!("{}@{}", self.credential.user, self.address)
    }
}
