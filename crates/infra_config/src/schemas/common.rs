//! Shapes shared by several schemas.

use serde::{Deserialize, Serialize};

use crate::validator::{compile, Pattern, SchemaValidator};

/// What happens to a resource when it leaves the stack.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RemovalPolicy {
    Destroy,
    #[default]
    Retain,
    Snapshot,
}

impl RemovalPolicy {
    /// CloudFormation `DeletionPolicy` value.
    pub fn deletion_policy(&self) -> &'static str {
        match self {
            RemovalPolicy::Destroy => "Delete",
            RemovalPolicy::Retain => "Retain",
            RemovalPolicy::Snapshot => "Snapshot",
        }
    }
}

pub(crate) static KMS_KEY_PATTERN: Pattern = Pattern::new(|| {
    compile(r"^(arn:[a-z-]+:kms:[a-z0-9-]+:\d{12}:(key|alias)/[A-Za-z0-9/_-]+|alias/[A-Za-z0-9/_-]+|[0-9a-f-]{36})$")
});

pub(crate) static ROLE_ARN_PATTERN: Pattern =
    Pattern::new(|| compile(r"^arn:[a-z-]+:iam::\d{12}:role/[\w+=,.@/-]+$"));

/// Check an optional KMS key reference.
pub(crate) fn check_kms_key(validator: &mut SchemaValidator, field: &str, key: Option<&str>) {
    if let Some(key) = key {
        validator.pattern(field, key, &KMS_KEY_PATTERN, "a KMS key ARN, alias or key id");
    }
}
