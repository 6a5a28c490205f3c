//! Domain layer: pure types, classification, and validation.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All functions are synchronous and take data in, returning data out.

pub mod config;
pub mod error;
pub mod probe;
pub mod scenario;
pub mod suite;
pub mod target;

pub use config::{EnvOverrides, HarnessConfig, ReadinessPolicy, parse_var};
pub use error::{
    CommandTimeout, ConfigError, DestroyError, InventoryError, ProvisionError, ReadinessTimeout,
    ScenarioError, TransportError,
};
pub use probe::{CommandOutput, ExitExpectation, Predicate, Probe, Verdict};
pub use scenario::{
    BuildContext, Expectations, LookupErrors, OutputExpectation, Preset, Scenario, ScenarioFile,
    ScenarioSpec, TemplateLocation,
};
pub use suite::{ProbeSuite, SuiteKind};
pub use target::{Credential, Readiness, Target};
