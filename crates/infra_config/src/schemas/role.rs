//! IAM role configuration.

use serde::{Deserialize, Serialize};

use crate::mapper::ConfigSchema;
use crate::validator::{compile, Pattern, SchemaValidator};

static ROLE_NAME_PATTERN: Pattern = Pattern::new(|| compile(r"^[\w+=,.@-]{1,64}$"));
static ROLE_PATH_PATTERN: Pattern = Pattern::new(|| compile(r"^/([\x21-\x7E]*/)?$"));
static SERVICE_PRINCIPAL_PATTERN: Pattern =
    Pattern::new(|| compile(r"^[a-z0-9.-]+\.amazonaws\.com(\.cn)?$"));
static ACCOUNT_ID_PATTERN: Pattern = Pattern::new(|| compile(r"^\d{12}$"));
static MANAGED_POLICY_PATTERN: Pattern =
    Pattern::new(|| compile(r"^arn:[a-z-]+:iam::(aws|\d{12}):policy/[\w+=,.@/-]+$"));
static ACTION_PATTERN: Pattern = Pattern::new(|| compile(r"^(\*|[a-z0-9-]+:[A-Za-z0-9*]+)$"));

pub const MIN_SESSION_DURATION: u32 = 3_600;
pub const MAX_SESSION_DURATION: u32 = 43_200;

/// Who may assume the role. Exactly one field is set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AssumedBy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub federated: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PolicyStatement {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sid: Option<String>,
    pub effect: Effect,
    pub actions: Vec<String>,
    pub resources: Vec<String>,
}

fn default_max_session() -> u32 {
    MIN_SESSION_DURATION
}

/// A role definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RoleConfig {
    pub role_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub assumed_by: AssumedBy,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub managed_policy_arns: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub statements: Vec<PolicyStatement>,
    #[serde(default = "default_max_session")]
    pub max_session_duration_seconds: u32,
}

impl ConfigSchema for RoleConfig {
    const NAME: &'static str = "RoleConfig";

    fn validate(&self, validator: &mut SchemaValidator) {
        validator.pattern(
            "roleName",
            &self.role_name,
            &ROLE_NAME_PATTERN,
            "1-64 characters from letters, digits and +=,.@_-",
        );
        if let Some(path) = &self.path {
            validator.pattern("path", path, &ROLE_PATH_PATTERN, "a path starting and ending with '/'");
        }

        let principal = &self.assumed_by;
        validator.nested("assumedBy", |v| {
            let single = v.exactly_one(&[
                ("service", principal.service.is_some()),
                ("accountId", principal.account_id.is_some()),
                ("federated", principal.federated.is_some()),
            ]);
            if !single {
                return;
            }
            if let Some(service) = &principal.service {
                v.pattern("service", service, &SERVICE_PRINCIPAL_PATTERN, "a service principal");
            }
            if let Some(account) = &principal.account_id {
                v.pattern("accountId", account, &ACCOUNT_ID_PATTERN, "a 12-digit account id");
            }
            if let Some(federated) = &principal.federated {
                v.required("federated", federated);
            }
        });

        for (i, arn) in self.managed_policy_arns.iter().enumerate() {
            validator.element("managedPolicyArns", i, |v| {
                v.pattern("", arn, &MANAGED_POLICY_PATTERN, "a managed policy ARN");
            });
        }

        for (i, statement) in self.statements.iter().enumerate() {
            validator.element("statements", i, |v| {
                if v.non_empty("actions", &statement.actions) {
                    for action in &statement.actions {
                        v.pattern("actions", action, &ACTION_PATTERN, "service:Action");
                    }
                }
                v.non_empty("resources", &statement.resources);
            });
        }

        validator.range(
            "maxSessionDurationSeconds",
            self.max_session_duration_seconds,
            MIN_SESSION_DURATION,
            MAX_SESSION_DURATION,
        );
    }
}
