//! Probe suites and the standard verification batteries.
//!
//! Pure data, no I/O. Execution lives in `application::services::suite`.

use serde::{Deserialize, Serialize};

use crate::domain::probe::{ExitExpectation, Predicate, Probe, WEAK_DIGEST_REJECTIONS};

/// Named, ordered collection of independent probes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProbeSuite {
    pub name: String,
    pub probes: Vec<Probe>,
}

impl ProbeSuite {
    #[must_use]
    pub fn new(name: &str, probes: Vec<Probe>) -> Self {
        Self {
            name: name.to_string(),
            probes,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.probes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.probes.is_empty()
    }
}

/// The built-in suites a scenario can select by name.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum SuiteKind {
    Security,
    Runtime,
    Metadata,
    Monitoring,
}

impl SuiteKind {
    pub const ALL: [SuiteKind; 4] = [
        SuiteKind::Security,
        SuiteKind::Runtime,
        SuiteKind::Metadata,
        SuiteKind::Monitoring,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Runtime => "runtime",
            Self::Metadata => "metadata",
            Self::Monitoring => "monitoring",
        }
    }

    #[must_use]
    pub fn summary(self) -> &'static str {
        match self {
            Self::Security => "FIPS kernel mode, crypto policy, weak digest rejection",
            Self::Runtime => "SELinux, root filesystem, SSH listener",
            Self::Metadata => "instance metadata service requires session tokens",
            Self::Monitoring => "CloudWatch and SSM agents are active",
        }
    }

    #[must_use]
    pub fn suite(self) -> ProbeSuite {
        match self {
            Self::Security => security_suite(),
            Self::Runtime => runtime_suite(),
            Self::Metadata => metadata_suite(),
            Self::Monitoring => monitoring_suite(),
        }
    }
}

impl std::fmt::Display for SuiteKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SuiteKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| {
                let valid: Vec<_> = Self::ALL.iter().map(|k| k.name()).collect();
                format!("unknown suite '{s}' (valid: {})", valid.join(", "))
            })
    }
}

fn contains(text: &str) -> Predicate {
    Predicate::Contains(text.to_string())
}

#[must_use]
pub fn security_suite() -> ProbeSuite {
    ProbeSuite::new(
        "security",
        vec![
            Probe::new(
                "fips_kernel_enabled",
                "cat /proc/sys/crypto/fips_enabled",
                contains("1"),
            )
            .describe("kernel reports FIPS mode"),
            Probe::new(
                "crypto_policy_fips",
                "update-crypto-policies --show",
                contains("FIPS"),
            )
            .describe("system-wide crypto policy is FIPS"),
            Probe::new(
                "fips_mode_setup_check",
                "sudo fips-mode-setup --check",
                contains("enabled"),
            )
            .describe("fips-mode-setup reports FIPS mode enabled"),
            Probe::new(
                "md5_blocked",
                "openssl md5 /dev/null 2>&1",
                Predicate::Rejected {
                    signatures: WEAK_DIGEST_REJECTIONS
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                },
            )
            .describe("OpenSSL refuses MD5"),
        ],
    )
}

#[must_use]
pub fn runtime_suite() -> ProbeSuite {
    ProbeSuite::new(
        "runtime",
        vec![
            Probe::new("selinux_enforcing", "getenforce", contains("Enforcing"))
                .describe("SELinux is enforcing"),
            Probe::new("root_filesystem_xfs", "mount | grep ' / '", contains("xfs"))
                .describe("root filesystem is XFS"),
            Probe::new(
                "ssh_port_listening",
                "sudo ss -tlnp | grep ':22 '",
                contains(":22"),
            )
            .describe("sshd listens on port 22"),
        ],
    )
}

#[must_use]
pub fn metadata_suite() -> ProbeSuite {
    ProbeSuite::new(
        "metadata",
        vec![
            Probe::new(
                "imdsv2_enforced",
                "curl -s -o /dev/null -w '%{http_code}' http://169.254.169.254/latest/meta-data/instance-id",
                Predicate::Equals("401".to_string()),
            )
            .exit(ExitExpectation::Any)
            .describe("tokenless metadata request is refused with 401"),
        ],
    )
}

#[must_use]
pub fn monitoring_suite() -> ProbeSuite {
    ProbeSuite::new(
        "monitoring",
        vec![
            Probe::new(
                "cloudwatch_agent_running",
                "sudo systemctl is-active amazon-cloudwatch-agent",
                contains("active"),
            )
            .describe("CloudWatch agent unit is active"),
            Probe::new(
                "ssm_agent_running",
                "sudo systemctl is-active amazon-ssm-agent",
                contains("active"),
            )
            .describe("SSM agent unit is active"),
        ],
    )
}
