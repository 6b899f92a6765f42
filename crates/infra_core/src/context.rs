//! Account-level context shared by every unit of a synthesis pass.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Default AWS partition.
pub const DEFAULT_PARTITION: &str = "aws";

static ACCOUNT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{12}$").unwrap());
static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}(-[a-z]+)+-[0-9]+$").unwrap());

/// The account and region a stack is synthesized for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountContext {
    /// 12-digit account id
    pub account: String,
    /// Region code (e.g., "eu-west-1")
    pub region: String,
    /// Partition (e.g., "aws", "aws-cn", "aws-us-gov")
    #[serde(default = "default_partition")]
    pub partition: String,
}

fn default_partition() -> String {
    DEFAULT_PARTITION.to_string()
}

impl AccountContext {
    /// Create a context, rejecting malformed account ids and regions.
    pub fn new(account: impl Into<String>, region: impl Into<String>) -> CoreResult<Self> {
        let ctx = Self {
            account: account.into(),
            region: region.into(),
            partition: default_partition(),
        };
        ctx.validate()?;
        Ok(ctx)
    }

    pub fn with_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Check the account id and region shape.
    pub fn validate(&self) -> CoreResult<()> {
        if !ACCOUNT_RE.is_match(&self.account) {
            return Err(CoreError::InvalidAccount(format!(
                "account id '{}' must be 12 digits",
                self.account
            )));
        }
        if !REGION_RE.is_match(&self.region) {
            return Err(CoreError::InvalidAccount(format!(
                "region '{}' is not a region code",
                self.region
            )));
        }

        if self.partition.is_empty() {
            return Err(CoreError::InvalidAccount("partition must not be empty".to_string()));
        }
        Ok(())
    }

    /// Build a fully-qualified ARN for a regional resource in this account.
    pub fn arn(&self, service: &str, resource: &str) -> String {
        format!(
            "arn:{}:{}:{}:{}:{}",
            self.partition, service, self.region, self.account, resource
        )
    }

    /// Built-in template values contributed by the account.
    pub fn context_values(&self) -> [(&'static str, String); 3] {
        [
            ("account", self.account.clone()),
            ("region", self.region.clone()),
            ("partition", self.partition.clone()),
        ]
    }
}
