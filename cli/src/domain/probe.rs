//! Probe definitions and pure outcome classification.
//!
//! A probe is data: a remote command plus a predicate over what came back.
//! Classification never performs I/O; the probe runner feeds it the
//! executor's output.

use regex::Regex;
use serde::{Deserialize, Serialize};
use vouch_common::ProbeOutcome;

/// What a remote command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout followed by stderr.
    pub output: String,
    pub exit_status: i32,
}

impl CommandOutput {
    #[must_use]
    pub fn new(output: impl Into<String>, exit_status: i32) -> Self {
        Self {
            output: output.into(),
            exit_status,
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_status == 0
    }
}

/// Which exit statuses are compatible with a pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitExpectation {
    /// Non-zero exit is a `Fail`.
    #[default]
    Success,
    /// Exit status is ignored; only the output is judged.
    Any,
    /// Zero exit is a `Fail` (the command was supposed to be refused).
    Failure,
}

/// Condition over a probe's output.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    Contains(String),
    /// Compared against the trimmed output.
    Equals(String),
    Matches(String),
    /// The command must be refused with one of a closed set of signatures.
    /// Exit status is judged by the signature match, not `ExitExpectation`.
    Rejected { signatures: Vec<String> },
}

impl Predicate {
    /// `Ok(true)` if the output satisfies the predicate, `Err` if it cannot
    /// be evaluated at all.
    fn evaluate(&self, output: &str) -> Result<bool, String> {
        match self {
            Self::Contains(needle) => Ok(output.contains(needle.as_str())),
            Self::Equals(expected) => Ok(output.trim() == expected),
            Self::Matches(pattern) => Regex::new(pattern)
                .map(|re| re.is_match(output))
                .map_err(|e| format!("invalid pattern /{pattern}/: {e}")),
            Self::Rejected { signatures } => {
                Ok(signatures.iter().any(|s| output.contains(s.as_str())))
            }
        }
    }

    fn mismatch(&self, output: &str) -> String {
        match self {
            Self::Contains(needle) => format!("expected output to contain {needle:?}"),
            Self::Equals(expected) => format!("expected {expected:?}, got {:?}", output.trim()),
            Self::Matches(pattern) => format!("expected output to match /{pattern}/"),
            Self::Rejected { .. } => "command was not rejected".to_string(),
        }
    }
}

/// Signatures OpenSSL emits when a digest is refused under FIPS policy.
pub const WEAK_DIGEST_REJECTIONS: &[&str] = &[
    "unsupported",
    "not supported",
    "disabled",
    "Error setting digest",
];

/// One atomic remote verification check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Probe {
    pub name: String,
    pub command: String,
    /// `{contains: ...}` style maps in YAML, not `!contains` tags.
    #[serde(with = "serde_yaml::with::singleton_map")]
    pub expect: Predicate,
    #[serde(default)]
    pub exit: ExitExpectation,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Classification of one probe execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub outcome: ProbeOutcome,
    pub detail: Option<String>,
}

impl Verdict {
    fn pass() -> Self {
        Self {
            outcome: ProbeOutcome::Pass,
            detail: None,
        }
    }

    fn fail(detail: String) -> Self {
        Self {
            outcome: ProbeOutcome::Fail,
            detail: Some(detail),
        }
    }

    fn error(detail: String) -> Self {
        Self {
            outcome: ProbeOutcome::Error,
            detail: Some(detail),
        }
    }
}

impl Probe {
    #[must_use]
    pub fn new(name: &str, command: &str, expect: Predicate) -> Self {
        Self {
            name: name.to_string(),
            command: command.to_string(),
            expect,
            exit: ExitExpectation::Success,
            description: String::new(),
        }
    }

    #[must_use]
    pub fn exit(mut self, exit: ExitExpectation) -> Self {
        self.exit = exit;
        self
    }

    #[must_use]
    pub fn describe(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Judge a completed command against this probe.
    #[must_use]
    pub fn classify(&self, out: &CommandOutput) -> Verdict {
        if let Predicate::Rejected { signatures } = &self.expect {
            return classify_rejection(signatures, out);
        }

        match self.exit {
            ExitExpectation::Success if !out.success() => {
                return Verdict::fail(format!("exited with status {}", out.exit_status));
            }
            ExitExpectation::Failure if out.success() => {
                return Verdict::fail("exited with status 0; expected a failure".to_string());
            }
            _ => {}
        }

        match self.expect.evaluate(&out.output) {
            Ok(true) => Verdict::pass(),
            Ok(false) => Verdict::fail(self.expect.mismatch(&out.output)),
            Err(reason) => Verdict::error(reason),
        }
    }

    /// Check that a probe loaded from a scenario file can be executed.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the probe is unusable.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("name is empty".to_string());
        }
        if self.command.trim().is_empty() {
            return Err("command is empty".to_string());
        }
        match &self.expect {
            Predicate::Matches(pattern) => Regex::new(pattern)
                .map(|_| ())
                .map_err(|e| format!("invalid pattern /{pattern}/: {e}")),
            Predicate::Rejected { signatures } if signatures.is_empty() => {
                Err("rejected predicate needs at least one signature".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// A zero exit is always a `Fail`, whatever warnings came with it. A refusal
/// passes only on a recognised signature; any other refusal is
/// unclassifiable rather than a finding.
fn classify_rejection(signatures: &[String], out: &CommandOutput) -> Verdict {
    if out.success() {
        return Verdict::fail("command succeeded; expected it to be rejected".to_string());
    }
    if signatures.iter().any(|s| out.output.contains(s.as_str())) {
        return Verdict::pass();
    }
    Verdict::error(format!(
        "exit status {} with output matching no known rejection signature",
        out.exit_status
    ))
}
