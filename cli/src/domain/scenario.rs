//! Scenario definitions: what to provision, what to verify, what to expect.
//!
//! A scenario file is parsed into [`ScenarioSpec`]s, which are resolved
//! against harness config and command-line overrides into immutable
//! [`Scenario`]s. Once built, nothing else alters a scenario's target shape.

use std::collections::{BTreeMap, HashSet};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use vouch_common::{ExpectationResult, ProbeOutcome, ProvisioningMetadata};

use crate::domain::config::{HarnessConfig, ReadinessPolicy};
use crate::domain::error::ScenarioError;
use crate::domain::suite::{ProbeSuite, SuiteKind};

/// Scenario names double as resource names, so they follow DNS-label rules.
pub static SCENARIO_NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    // Safety: this is a compile-time constant pattern; cannot fail.
    #[allow(clippy::expect_used)]
    Regex::new(r"^[a-z0-9]([a-z0-9-]{0,61}[a-z0-9])?$").expect("valid regex")
});

/// Region preset deployments use when none is configured.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Values every preset asserts on the instance tags.
pub const MODULE_TAG: &str = "terraform-aws-ec2-rocky9-fips";
pub const OS_TAG: &str = "Rocky Linux 9";

// ── Presets ──────────────────────────────────────────────────────────────────

/// The three standard deployments.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Preset {
    /// SSH-only instance, no IAM or agents.
    Minimal,
    /// CloudWatch logs and SSM enabled.
    Standard,
    /// Everything, including alarms, SNS and EBS snapshots.
    Full,
}

impl Preset {
    #[must_use]
    pub fn suites(self) -> Vec<SuiteKind> {
        match self {
            Self::Minimal => vec![SuiteKind::Security, SuiteKind::Runtime, SuiteKind::Metadata],
            Self::Standard => vec![
                SuiteKind::Security,
                SuiteKind::Runtime,
                SuiteKind::Monitoring,
                SuiteKind::Metadata,
            ],
            Self::Full => vec![
                SuiteKind::Security,
                SuiteKind::Runtime,
                SuiteKind::Metadata,
                SuiteKind::Monitoring,
            ],
        }
    }

    /// Template directory, relative to the template root.
    #[must_use]
    pub fn template_dir(self) -> &'static str {
        match self {
            Self::Minimal => "examples/minimal",
            Self::Standard | Self::Full => "examples/complete",
        }
    }

    #[must_use]
    pub fn vars(self) -> BTreeMap<String, Value> {
        let mut vars = BTreeMap::new();
        vars.insert("ip_allow_ssh".to_string(), serde_json::json!(["0.0.0.0/0"]));
        if matches!(self, Self::Standard | Self::Full) {
            vars.insert("enable_cloudwatch_logs".to_string(), Value::Bool(true));
            vars.insert("enable_ssm".to_string(), Value::Bool(true));
        }
        if self == Self::Full {
            vars.insert("enable_security_alarms".to_string(), Value::Bool(true));
            vars.insert("create_sns_topic".to_string(), Value::Bool(true));
            vars.insert("alarm_email".to_string(), Value::from("test@example.com"));
            vars.insert("enable_ebs_snapshots".to_string(), Value::Bool(true));
        }
        vars
    }

    #[must_use]
    pub fn expectations(self, name: &str) -> Expectations {
        let mut tags = BTreeMap::from([
            ("Name".to_string(), name.to_string()),
            ("ManagedBy".to_string(), "terraform".to_string()),
            ("FIPS".to_string(), "enabled".to_string()),
        ]);
        if self != Self::Full {
            tags.insert("Module".to_string(), MODULE_TAG.to_string());
            tags.insert("OS".to_string(), OS_TAG.to_string());
        }

        let mut outputs = BTreeMap::new();
        non_empty(&mut outputs, &["instance_id", "public_ip"]);
        match self {
            Self::Minimal => {
                non_empty(&mut outputs, &["ami_id", "ami_name"]);
                outputs.insert(
                    "ssh_command".to_string(),
                    OutputExpectation::Contains(vec!["rocky@".to_string()]),
                );
            }
            Self::Standard => non_empty(
                &mut outputs,
                &[
                    "private_ip",
                    "ami_id",
                    "ami_name",
                    "security_group_id",
                    "iam_role_arn",
                    "cloudwatch_dashboard_url",
                ],
            ),
            Self::Full => {
                non_empty(&mut outputs, &["iam_role_arn", "cloudwatch_dashboard_url"]);
                outputs.insert(
                    "sns_topic_arn".to_string(),
                    OutputExpectation::Contains(vec!["arn:".to_string(), name.to_string()]),
                );
            }
        }
        if self != Self::Minimal {
            outputs.insert(
                "cloudwatch_log_group_name".to_string(),
                OutputExpectation::Equals(log_group_name(name)),
            );
        }

        Expectations { tags, outputs }
    }
}

fn non_empty(outputs: &mut BTreeMap<String, OutputExpectation>, names: &[&str]) {
    for n in names {
        outputs.insert((*n).to_string(), OutputExpectation::NonEmpty);
    }
}

/// Log group the monitoring stack derives from the scenario name.
#[must_use]
pub fn log_group_name(scenario: &str) -> String {
    format!("/{scenario}/ec2")
}

// ── Metadata expectations ────────────────────────────────────────────────────

/// Assertion over one declared template output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputExpectation {
    NonEmpty,
    Equals(String),
    /// Every listed fragment must appear.
    Contains(Vec<String>),
}

impl OutputExpectation {
    fn check(&self, actual: &str) -> Result<(), String> {
        match self {
            Self::NonEmpty if actual.trim().is_empty() => Err("output is empty".to_string()),
            Self::Equals(expected) if actual != expected => {
                Err(format!("expected {expected:?}, got {actual:?}"))
            }
            Self::Contains(fragments) => {
                match fragments.iter().find(|f| !actual.contains(f.as_str())) {
                    Some(missing) => Err(format!("{actual:?} does not contain {missing:?}")),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Expected instance tags and template outputs.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Expectations {
    pub tags: BTreeMap<String, String>,
    #[serde(with = "serde_yaml::with::singleton_map_recursive")]
    pub outputs: BTreeMap<String, OutputExpectation>,
}

/// Lookup failures gathered while collecting provisioning metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LookupErrors {
    pub tags: Option<String>,
    pub outputs: BTreeMap<String, String>,
}

impl Expectations {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty() && self.outputs.is_empty()
    }

    /// Later entries win, key by key.
    pub fn merge(&mut self, other: Expectations) {
        self.tags.extend(other.tags);
        self.outputs.extend(other.outputs);
    }

    /// Judge collected metadata. Tags come first, then outputs, each in key
    /// order. A failed lookup is `Error`, a mismatch is `Fail`.
    #[must_use]
    pub fn evaluate(
        &self,
        metadata: &ProvisioningMetadata,
        errors: &LookupErrors,
    ) -> Vec<ExpectationResult> {
        let mut results = Vec::with_capacity(self.tags.len() + self.outputs.len());

        for (key, expected) in &self.tags {
            let subject = format!("tag:{key}");
            let result = if let Some(err) = &errors.tags {
                expectation(subject, ProbeOutcome::Error, Some(err.clone()))
            } else {
                match metadata.tags.get(key) {
                    None => expectation(subject, ProbeOutcome::Fail, Some("tag missing".into())),
                    Some(actual) if actual != expected => expectation(
                        subject,
                        ProbeOutcome::Fail,
                        Some(format!("expected {expected:?}, got {actual:?}")),
                    ),
                    Some(_) => expectation(subject, ProbeOutcome::Pass, None),
                }
            };
            results.push(result);
        }

        for (name, check) in &self.outputs {
            let subject = format!("output:{name}");
            let result = if let Some(err) = errors.outputs.get(name) {
                expectation(subject, ProbeOutcome::Error, Some(err.clone()))
            } else {
                match metadata.outputs.get(name) {
                    None => expectation(
                        subject,
                        ProbeOutcome::Error,
                        Some("output was not collected".into()),
                    ),
                    Some(actual) => match check.check(actual) {
                        Ok(()) => expectation(subject, ProbeOutcome::Pass, None),
                        Err(detail) => expectation(subject, ProbeOutcome::Fail, Some(detail)),
                    },
                }
            };
            results.push(result);
        }

        results
    }
}

fn expectation(
    subject: String,
    outcome: ProbeOutcome,
    detail: Option<String>,
) -> ExpectationResult {
    ExpectationResult {
        subject,
        outcome,
        detail,
    }
}

// ── Scenario file schema ─────────────────────────────────────────────────────

/// Where the template comes from, as written in a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct TemplateSource {
    /// Directory copied as a whole before provisioning.
    pub root: Option<PathBuf>,
    /// Working directory inside `root`.
    pub dir: Option<PathBuf>,
}

/// Per-scenario readiness overrides.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ReadinessOverride {
    pub max_attempts: Option<u32>,
    pub interval_secs: Option<u64>,
    pub command: Option<String>,
}

impl ReadinessOverride {
    fn apply(&self, base: &ReadinessPolicy) -> ReadinessPolicy {
        ReadinessPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts),
            interval_secs: self.interval_secs.unwrap_or(base.interval_secs),
            command: self.command.clone().unwrap_or_else(|| base.command.clone()),
        }
    }
}

/// One entry of a scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioSpec {
    pub name: String,
    pub preset: Option<Preset>,
    pub template: Option<TemplateSource>,
    pub vars: BTreeMap<String, Value>,
    /// Replaces the preset's suite selection when present.
    pub suites: Option<Vec<SuiteKind>>,
    pub custom_suites: Vec<ProbeSuite>,
    /// Merged over the preset's expectations.
    pub expect: Option<Expectations>,
    pub readiness: ReadinessOverride,
}

/// Top-level scenario file.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ScenarioFile {
    /// Default template root for every scenario in the file.
    pub template_root: Option<PathBuf>,
    pub scenarios: Vec<ScenarioSpec>,
}

/// Everything outside a scenario entry that shapes the built scenario.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub config: &'a HarnessConfig,
    /// `--var` overrides, applied last.
    pub overrides: &'a BTreeMap<String, Value>,
    /// Relative template paths resolve against this directory.
    pub base_dir: &'a Path,
}

impl ScenarioFile {
    /// Resolve and validate every scenario, returning those selected by
    /// `only` (all of them when `only` is empty) in file order.
    ///
    /// # Errors
    ///
    /// Returns the first validation failure found.
    pub fn build(
        &self,
        ctx: &BuildContext<'_>,
        only: &[String],
    ) -> Result<Vec<Scenario>, ScenarioError> {
        if self.scenarios.is_empty() {
            return Err(ScenarioError::Empty);
        }

        let mut seen = HashSet::new();
        for spec in &self.scenarios {
            if !seen.insert(spec.name.as_str()) {
                return Err(ScenarioError::DuplicateName(spec.name.clone()));
            }
        }
        if let Some(unknown) = only.iter().find(|n| !seen.contains(n.as_str())) {
            return Err(ScenarioError::UnknownScenario(unknown.clone()));
        }

        let mut built = Vec::with_capacity(self.scenarios.len());
        for spec in &self.scenarios {
            let scenario = Scenario::from_spec(spec, self.template_root.as_deref(), ctx)?;
            if only.is_empty() || only.contains(&scenario.name) {
                built.push(scenario);
            }
        }
        Ok(built)
    }
}

// ── Resolved scenario ────────────────────────────────────────────────────────

/// Resolved template location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TemplateLocation {
    pub root: PathBuf,
    /// Relative to `root`; never escapes it.
    pub dir: PathBuf,
}

impl TemplateLocation {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, dir: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            dir: dir.into(),
        }
    }

    #[must_use]
    pub fn working_dir(&self) -> PathBuf {
        self.root.join(&self.dir)
    }
}

/// An immutable, fully resolved verification scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scenario {
    pub name: String,
    pub template: TemplateLocation,
    pub vars: BTreeMap<String, Value>,
    /// Standard suites first, then custom suites, in run order.
    pub suites: Vec<ProbeSuite>,
    pub expect: Expectations,
    pub readiness: ReadinessPolicy,
}

impl Scenario {
    /// A bare scenario with no suites, expectations or extra vars.
    #[must_use]
    pub fn new(name: &str, template: TemplateLocation) -> Self {
        Self {
            name: name.to_string(),
            template,
            vars: BTreeMap::from([("name".to_string(), Value::from(name))]),
            suites: Vec::new(),
            expect: Expectations::default(),
            readiness: ReadinessPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_suites(mut self, suites: Vec<ProbeSuite>) -> Self {
        self.suites = suites;
        self
    }

    #[must_use]
    pub fn with_expectations(mut self, expect: Expectations) -> Self {
        self.expect = expect;
        self
    }

    #[must_use]
    pub fn with_readiness(mut self, readiness: ReadinessPolicy) -> Self {
        self.readiness = readiness;
        self
    }

    #[must_use]
    pub fn with_var(mut self, key: &str, value: Value) -> Self {
        self.vars.insert(key.to_string(), value);
        self
    }

    /// Name the template gives its resources: the `name` var, which
    /// defaults to the scenario name.
    #[must_use]
    pub fn resource_name(&self) -> String {
        match self.vars.get("name") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.name.clone(),
        }
    }

    #[must_use]
    pub fn log_group_name(&self) -> String {
        log_group_name(&self.resource_name())
    }

    #[must_use]
    pub fn probe_count(&self) -> usize {
        self.suites.iter().map(ProbeSuite::len).sum()
    }

    /// Resolve one file entry.
    ///
    /// Variables merge in this order, later wins: `defaults.vars`, the
    /// configured AWS region and key pair, preset vars, entry vars, `--var`
    /// overrides. Preset scenarios fall back to [`DEFAULT_REGION`].
    /// `name` defaults to the scenario name; preset expectations follow the
    /// final `name`, since that is what the template tags and derives from.
    ///
    /// # Errors
    ///
    /// Returns a [`ScenarioError`] describing the first invalid field.
    pub fn from_spec(
        spec: &ScenarioSpec,
        file_root: Option<&Path>,
        ctx: &BuildContext<'_>,
    ) -> Result<Self, ScenarioError> {
        validate_scenario_name(&spec.name)?;
        let name = spec.name.clone();

        let template = resolve_template(spec, file_root, ctx.base_dir)?;

        let mut vars = ctx.config.defaults.vars.clone();
        if let Some(region) = &ctx.config.aws.region {
            vars.insert("aws_region".to_string(), Value::from(region.as_str()));
        }
        if let Some(key_pair) = &ctx.config.aws.key_pair {
            vars.insert("key_pair_name".to_string(), Value::from(key_pair.as_str()));
        }
        if let Some(preset) = spec.preset {
            vars.extend(preset.vars());
        }
        vars.extend(spec.vars.clone());
        vars.extend(ctx.overrides.clone());
        vars.entry("name".to_string())
            .or_insert_with(|| Value::from(name.as_str()));
        if spec.preset.is_some() {
            vars.entry("aws_region".to_string())
                .or_insert_with(|| Value::from(DEFAULT_REGION));
        }

        let kinds = spec
            .suites
            .clone()
            .or_else(|| spec.preset.map(Preset::suites))
            .unwrap_or_default();
        let mut suites: Vec<ProbeSuite> = kinds.into_iter().map(SuiteKind::suite).collect();
        suites.extend(spec.custom_suites.iter().cloned());
        if suites.iter().all(ProbeSuite::is_empty) {
            return Err(ScenarioError::NoSuites(name));
        }

        let mut suite_names = HashSet::new();
        for suite in &suites {
            if !suite_names.insert(suite.name.as_str()) {
                return Err(ScenarioError::DuplicateSuite {
                    scenario: name.clone(),
                    suite: suite.name.clone(),
                });
            }
            for probe in &suite.probes {
                probe
                    .validate()
                    .map_err(|reason| ScenarioError::InvalidProbe {
                        scenario: name.clone(),
                        probe: probe.name.clone(),
                        reason,
                    })?;
            }
        }

        let mut scenario = Self {
            readiness: spec.readiness.apply(&ctx.config.readiness),
            name,
            template,
            vars,
            suites,
            expect: Expectations::default(),
        };
        if let Some(preset) = spec.preset {
            scenario.expect = preset.expectations(&scenario.resource_name());
        }
        if let Some(extra) = &spec.expect {
            scenario.expect.merge(extra.clone());
        }
        Ok(scenario)
    }
}

/// Validates a scenario name against [`SCENARIO_NAME_RE`].
///
/// # Errors
///
/// Returns [`ScenarioError::InvalidName`] if the name does not match.
pub fn validate_scenario_name(name: &str) -> Result<(), ScenarioError> {
    if SCENARIO_NAME_RE.is_match(name) {
        Ok(())
    } else {
        Err(ScenarioError::InvalidName(name.to_string()))
    }
}

fn resolve_template(
    spec: &ScenarioSpec,
    file_root: Option<&Path>,
    base_dir: &Path,
) -> Result<TemplateLocation, ScenarioError> {
    let invalid = |reason: &str| ScenarioError::InvalidTemplate {
        scenario: spec.name.clone(),
        reason: reason.to_string(),
    };

    let source = spec.template.clone().unwrap_or_default();
    let root = source
        .root
        .as_deref()
        .or(file_root)
        .ok_or_else(|| invalid("no template root; set 'template.root' or 'template_root'"))?;
    let root = if root.is_absolute() {
        root.to_path_buf()
    } else {
        base_dir.join(root)
    };

    let dir = source
        .dir
        .or_else(|| spec.preset.map(|p| PathBuf::from(p.template_dir())))
        .unwrap_or_else(|| PathBuf::from("."));
    if dir
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
    {
        return Err(invalid("'template.dir' must be a relative path inside the root"));
    }

    Ok(TemplateLocation { root, dir })
}

// ── Unit tests ───────────────────────────────────────────────────────────────
