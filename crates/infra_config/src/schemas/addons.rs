//! EKS add-on bundle configuration.

use serde::{Deserialize, Serialize};

use super::common::ROLE_ARN_PATTERN;
use crate::mapper::ConfigSchema;
use crate::validator::{compile, Pattern, SchemaValidator, ViolationRule};

static CLUSTER_NAME_PATTERN: Pattern =
    Pattern::new(|| compile(r"^[0-9A-Za-z][A-Za-z0-9_-]{0,99}$"));
static ADDON_VERSION_PATTERN: Pattern =
    Pattern::new(|| compile(r"^v\d+\.\d+\.\d+(-eksbuild\.\d+)?$"));

/// How EKS treats fields that differ from the add-on defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ResolveConflicts {
    None,
    #[default]
    Overwrite,
    Preserve,
}

impl ResolveConflicts {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveConflicts::None => "NONE",
            ResolveConflicts::Overwrite => "OVERWRITE",
            ResolveConflicts::Preserve => "PRESERVE",
        }
    }
}

/// Settings for a single managed add-on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddOnConfig {
    pub version: String,
    #[serde(default)]
    pub resolve_conflicts: ResolveConflicts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_account_role_arn: Option<String>,
    /// Add-on specific configuration, passed through as JSON
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub configuration_values: Option<serde_json::Value>,
    #[serde(default)]
    pub preserve_on_delete: bool,
}

/// The six cluster add-ons every cluster carries. All are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct AddOnsConfig {
    /// Target cluster; the unit name is used when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster_name: Option<String>,
    pub vpc_cni: AddOnConfig,
    pub kube_proxy: AddOnConfig,
    pub core_dns: AddOnConfig,
    pub pod_identity_agent: AddOnConfig,
    pub ebs_csi_driver: AddOnConfig,
    pub container_insights: AddOnConfig,
}

impl AddOnsConfig {
    /// `(field, EKS add-on name, config)` for each add-on, in declaration order.
    pub fn entries(&self) -> [(&'static str, &'static str, &AddOnConfig); 6] {
        [
            ("vpcCni", "vpc-cni", &self.vpc_cni),
            ("kubeProxy", "kube-proxy", &self.kube_proxy),
            ("coreDns", "coredns", &self.core_dns),
            ("podIdentityAgent", "eks-pod-identity-agent", &self.pod_identity_agent),
            ("ebsCsiDriver", "aws-ebs-csi-driver", &self.ebs_csi_driver),
            ("containerInsights", "amazon-cloudwatch-observability", &self.container_insights),
        ]
    }
}

impl ConfigSchema for AddOnsConfig {
    const NAME: &'static str = "AddOnsConfig";

    fn validate(&self, validator: &mut SchemaValidator) {
        if let Some(cluster) = &self.cluster_name {
            validator.pattern("clusterName", cluster, &CLUSTER_NAME_PATTERN, "a cluster name");
        }
        for (field, _, addon) in self.entries() {
            validator.nested(field, |v| {
                v.pattern("version", &addon.version, &ADDON_VERSION_PATTERN, "an add-on version like v1.2.3-eksbuild.1");
                if let Some(arn) = &addon.service_account_role_arn {
                    v.pattern("serviceAccountRoleArn", arn, &ROLE_ARN_PATTERN, "an IAM role ARN");
                }
                if let Some(values) = &addon.configuration_values {
                    if !values.is_object() {
                        v.add("configurationValues", ViolationRule::Type, "must be an object");
                    }
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapper::ConfigMapper;
    use infra_templates::DocumentFormat;
    use serde_json::json;

    fn document() -> serde_json::Value {
        let addon = json!({"version": "v1.19.0-eksbuild.1"});
        json!({
            "vpcCni": addon,
            "kubeProxy": addon,
            "coreDns": {"version": "v1.11.1-eksbuild.9", "resolveConflicts": "preserve"},
            "podIdentityAgent": addon,
            "ebsCsiDriver": {
                "version": "v1.30.0-eksbuild.1",
                "serviceAccountRoleArn": "arn:aws:iam::123456789012:role/ebs-csi"
            },
            "containerInsights": {
                "version": "v1.6.0-eksbuild.1",
                "configurationValues": {"agent": {"config": {"logs": {}}}}
            }
        })
    }

    #[test]
    fn test_all_six_addons() {
        let config: AddOnsConfig =
            ConfigMapper::parse_str("addons.json", DocumentFormat::Json, &document().to_string()).unwrap();
        assert_eq!(config.core_dns.resolve_conflicts, ResolveConflicts::Preserve);
        assert_eq!(config.vpc_cni.resolve_conflicts, ResolveConflicts::Overwrite);
        assert!(config.container_insights.configuration_values.is_some());
        let names: Vec<_> = config.entries().iter().map(|(_, name, _)| *name).collect();
        assert_eq!(names.len(), 6);
        assert_eq!(names[2], "coredns");
    }

    #[test]
    fn test_each_addon_is_required() {
        for key in ["vpcCni", "kubeProxy", "coreDns", "podIdentityAgent", "ebsCsiDriver", "containerInsights"] {
            let mut doc = document();
            doc.as_object_mut().unwrap().remove(key);
            let err = ConfigMapper::parse_str::<AddOnsConfig>("addons.json", DocumentFormat::Json, &doc.to_string())
                .unwrap_err();
            assert_eq!(err.violations()[0].path, key);
            assert_eq!(err.violations()[0].rule, ViolationRule::Required);
        }
    }

    #[test]
    fn test_version_and_values_rules() {
        let mut doc = document();
        doc["kubeProxy"]["version"] = json!("latest");
        doc["vpcCni"]["configurationValues"] = json!("enableNetworkPolicy=true");
        let err = ConfigMapper::parse_str::<AddOnsConfig>("addons.json", DocumentFormat::Json, &doc.to_string())
            .unwrap_err();
        let paths: Vec<_> = err.violations().iter().map(|v| v.path.as_str()).collect();
        assert_eq!(paths, vec!["vpcCni.configurationValues", "kubeProxy.version"]);
    }
}
