//! Dispatch from a resource kind to its schema.

use std::fmt;
use std::str::FromStr;

use infra_templates::ResolvedDocument;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::mapper::ConfigMapper;
use crate::schemas::{AddOnsConfig, QueueConfig, RoleConfig, TableConfig};

/// Resource families with a config schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    #[serde(rename = "table")]
    Table,
    #[serde(rename = "queue")]
    Queue,
    #[serde(rename = "role")]
    Role,
    #[serde(rename = "eks-addons", alias = "addons")]
    EksAddOns,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Table,
        ResourceKind::Queue,
        ResourceKind::Role,
        ResourceKind::EksAddOns,
    ];

    /// Name used in manifests and on the command line.
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Table => "table",
            ResourceKind::Queue => "queue",
            ResourceKind::Role => "role",
            ResourceKind::EksAddOns => "eks-addons",
        }
    }

    /// Kind segment of construct identifiers. Never contains a delimiter.
    pub fn construct_kind(&self) -> &'static str {
        match self {
            ResourceKind::Table => "Table",
            ResourceKind::Queue => "Queue",
            ResourceKind::Role => "Role",
            ResourceKind::EksAddOns => "EksAddOns",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "table" => Ok(ResourceKind::Table),
            "queue" => Ok(ResourceKind::Queue),
            "role" => Ok(ResourceKind::Role),
            "eks-addons" | "addons" => Ok(ResourceKind::EksAddOns),
            _ => Err(ConfigError::UnknownKind(s.to_string())),
        }
    }
}

/// A validated config of any supported kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "config", rename_all = "kebab-case")]
pub enum ResourceConfig {
    Table(TableConfig),
    Queue(QueueConfig),
    Role(RoleConfig),
    #[serde(rename = "eks-addons")]
    EksAddOns(AddOnsConfig),
}

impl ResourceConfig {
    /// Parse `document` with the schema of `kind`.
    pub fn parse(kind: ResourceKind, document: &ResolvedDocument) -> ConfigResult<Self> {
        Ok(match kind {
            ResourceKind::Table => ResourceConfig::Table(ConfigMapper::parse(document)?),
            ResourceKind::Queue => ResourceConfig::Queue(ConfigMapper::parse(document)?),
            ResourceKind::Role => ResourceConfig::Role(ConfigMapper::parse(document)?),
            ResourceKind::EksAddOns => ResourceConfig::EksAddOns(ConfigMapper::parse(document)?),
        })
    }

    pub fn kind(&self) -> ResourceKind {
        match self {
            ResourceConfig::Table(_) => ResourceKind::Table,
            ResourceConfig::Queue(_) => ResourceKind::Queue,
            ResourceConfig::Role(_) => ResourceKind::Role,
            ResourceConfig::EksAddOns(_) => ResourceKind::EksAddOns,
        }
    }

    /// Physical resource name, where the schema declares one.
    pub fn resource_name(&self) -> Option<&str> {
        match self {
            ResourceConfig::Table(table) => Some(&table.table_name),
            ResourceConfig::Queue(queue) => Some(&queue.queue_name),
            ResourceConfig::Role(role) => Some(&role.role_name),
            ResourceConfig::EksAddOns(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_templates::DocumentFormat;

    #[test]
    fn test_kind_names() {
        for kind in ResourceKind::ALL {
            assert_eq!(kind.as_str().parse::<ResourceKind>().unwrap(), kind);
            assert!(!kind.construct_kind().contains('-'));
        }
        assert_eq!("addons".parse::<ResourceKind>().unwrap(), ResourceKind::EksAddOns);
        assert!(matches!("bucket".parse::<ResourceKind>(), Err(ConfigError::UnknownKind(k)) if k == "bucket"));

        let kind: ResourceKind = serde_yaml::from_str("eks-addons").unwrap();
        assert_eq!(kind, ResourceKind::EksAddOns);
    }

    #[test]
    fn test_parse_dispatches_on_kind() {
        let document = ResolvedDocument::new(
            "sqs/events.yaml",
            DocumentFormat::Yaml,
            "queueName: events-prod\n",
        );
        let config = ResourceConfig::parse(ResourceKind::Queue, &document).unwrap();
        assert_eq!(config.kind(), ResourceKind::Queue);
        assert_eq!(config.resource_name(), Some("events-prod"));

        let err = ResourceConfig::parse(ResourceKind::Table, &document).unwrap_err();
        assert!(matches!(err, ConfigError::SchemaValidationFailure { schema: "TableConfig", .. }));
    }
}
