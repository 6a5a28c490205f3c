//! Application services: use-case orchestration.
//!
//! Each service module implements a single use-case by composing domain logic
//! with port trait calls. Services import only from `crate::domain` and
//! `crate::application::ports`, never from `crate::infra`, `crate::commands`,
//! or `crate::output`.

pub mod orchestrator;
pub mod probe_runner;
pub mod readiness;
pub mod runner;
pub mod suite;

pub use orchestrator::{Collaborators, ScenarioOrchestrator};
pub use probe_runner::ProbeRunner;
pub use readiness::{Ready, await_ready, readiness_signal};
pub use runner::ScenarioRunner;
