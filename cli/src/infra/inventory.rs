//! Infrastructure implementation of the `InventoryReader` port.
//!
//! Tags come from `aws ec2 describe-tags`; outputs come from
//! `terraform output` in the provisioning handle's working directory.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::application::ports::{CommandRunner, InventoryReader};
use crate::domain::InventoryError;
use crate::infra::terraform::{failure_detail, output_text, runner_detail};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeTags {
    #[serde(default)]
    tags: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TagEntry {
    key: String,
    #[serde(default)]
    value: String,
}

/// Reads instance tags and template outputs through external CLIs.
pub struct AwsInventory<R: CommandRunner> {
    runner: R,
    region: Option<String>,
    timeout: Duration,
}

impl<R: CommandRunner> AwsInventory<R> {
    /// `region` is passed to every `aws` call when set; otherwise the CLI's
    /// own profile resolution applies.
    pub fn new(runner: R, region: Option<String>, timeout: Duration) -> Self {
        Self {
            runner,
            region,
            timeout,
        }
    }

    fn tag_args(&self, resource_id: &str) -> Vec<String> {
        let mut args = vec![
            "ec2".to_string(),
            "describe-tags".to_string(),
            "--filters".to_string(),
            format!("Name=resource-id,Values={resource_id}"),
            "--output".to_string(),
            "json".to_string(),
        ];
        if let Some(region) = &self.region {
            args.push("--region".to_string());
            args.push(region.clone());
        }
        args
    }
}

#[async_trait]
impl<R: CommandRunner> InventoryReader for AwsInventory<R> {
    async fn get_tags(
        &self,
        resource_id: &str,
    ) -> Result<BTreeMap<String, String>, InventoryError> {
        let fail = |detail: String| InventoryError::Tags {
            resource: resource_id.to_string(),
            detail,
        };
        let args = self.tag_args(resource_id);
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self
            .runner
            .run_with_timeout("aws", &argv, self.timeout)
            .await
            .map_err(|e| fail(runner_detail(&e)))?;
        if !output.status.success() {
            return Err(fail(failure_detail(&output)));
        }
        parse_tags(&output.stdout).map_err(fail)
    }

    async fn get_output(&self, handle: &str, name: &str) -> Result<String, InventoryError> {
        let fail = |detail: String| InventoryError::Output {
            name: name.to_string(),
            detail,
        };
        let chdir = format!("-chdir={handle}");
        let output = self
            .runner
            .run_with_timeout(
                "terraform",
                &[chdir.as_str(), "output", "-json", name],
                self.timeout,
            )
            .await
            .map_err(|e| fail(runner_detail(&e)))?;
        if !output.status.success() {
            return Err(fail(failure_detail(&output)));
        }
        let value: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| fail(format!("unparseable output: {e}")))?;
        Ok(output_text(&value))
    }
}

/// Parse `describe-tags` JSON into key → value.
pub(crate) fn parse_tags(stdout: &[u8]) -> Result<BTreeMap<String, String>, String> {
    let parsed: DescribeTags =
        serde_json::from_slice(stdout).map_err(|e| format!("unparseable tag listing: {e}"))?;
    Ok(parsed.tags.into_iter().map(|t| (t.key, t.value)).collect())
}
