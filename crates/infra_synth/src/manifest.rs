//! Stack manifests: which units a stack holds and how they are ordered.

use std::fs;
use std::path::{Path, PathBuf};

use infra_config::ResourceKind;
use infra_core::AccountContext;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::{SynthError, SynthResult};

/// Secret a unit needs before its template can be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct SecretSpec {
    /// Secret name or ARN
    #[serde(rename = "ref")]
    pub secret_ref: String,
    /// Fields land in the template context as `secrets.<alias>.<field>`
    pub alias: String,
    #[serde(default)]
    pub schema: SecretSchema,
}

/// Expected shape of a secret payload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SecretSchema {
    /// Any JSON object, or a plain string
    #[default]
    Json,
    /// Observability credentials bundle
    Observability,
}

/// One unit of a stack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UnitSpec {
    pub kind: ResourceKind,
    pub name: String,
    /// Template path, relative to the template roots
    pub template: String,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    /// Identifiers (`Kind-name`) of units this one follows
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<SecretSpec>,
}

/// A stack manifest (YAML).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StackManifest {
    pub stack: String,
    /// Left unset to take the account from the command line or settings
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,
    /// CDK-style context file (`cdk.json` or `cdk.context.json`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_file: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub context: Map<String, Value>,
    #[serde(default)]
    pub units: Vec<UnitSpec>,
}

impl StackManifest {
    /// Load and check a manifest. A relative `contextFile` is resolved
    /// against the manifest's directory.
    pub fn load(path: impl AsRef<Path>) -> SynthResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut manifest: StackManifest =
            serde_yaml::from_str(&content).map_err(|e| SynthError::InvalidManifest {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        if let (Some(file), Some(dir)) = (&manifest.context_file, path.parent()) {
            if file.is_relative() {
                manifest.context_file = Some(dir.join(file));
            }
        }

        manifest.check().map_err(|message| SynthError::InvalidManifest {
            path: path.to_path_buf(),
            message,
        })?;
        debug!("Loaded stack manifest {:?} ({} units)", path, manifest.units.len());
        Ok(manifest)
    }

    /// Structural checks that need no templates.
    pub fn check(&self) -> Result<(), String> {
        if self.stack.trim().is_empty() {
            return Err("stack name must not be empty".to_string());
        }
        if self.stack.contains('/') {
            return Err(format!("stack name '{}' must not contain '/'", self.stack));
        }
        for (i, unit) in self.units.iter().enumerate() {
            if unit.name.trim().is_empty() {
                return Err(format!("units[{}].name must not be empty", i));
            }
            if unit.template.trim().is_empty() {
                return Err(format!("units[{}].template must not be empty", i));
            }
            if let Some(secret) = &unit.secret {
                if secret.alias.trim().is_empty() || secret.alias.contains('.') {
                    return Err(format!(
                        "units[{}].secret.alias '{}' must be a non-empty name without '.'",
                        i, secret.alias
                    ));
                }
            }
        }
        Ok(())
    }

    /// Account context the stack is synthesized for.
    pub fn account_context(&self) -> SynthResult<AccountContext> {
        let (Some(account), Some(region)) = (&self.account, &self.region) else {
            return Err(SynthError::MissingAccount {
                stack: self.stack.clone(),
            });
        };
        let mut account = AccountContext::new(account, region)?;
        if let Some(partition) = &self.partition {
            account = account.with_partition(partition);
            account.validate()?;
        }
        Ok(account)
    }
}
