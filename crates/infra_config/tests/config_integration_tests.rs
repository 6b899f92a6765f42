//! Integration tests: resolve templates from disk and map them onto schemas.

use std::fs;

use infra_config::{
    AddOnsConfig, ConfigError, ConfigMapper, ResourceConfig, ResourceKind, TableConfig,
    ViolationRule,
};
use infra_templates::{FilesystemSource, TemplateReference, TemplateResolver};
use tempfile::TempDir;

const ADDONS: &str = r#"{
  "vpcCni": {"version": "v1.19.0-eksbuild.1", "configurationValues": {"env": {"CLUSTER": "{{env}}"}}},
  "kubeProxy": {"version": "v1.31.0-eksbuild.5"},
  "coreDns": {"version": "v1.11.3-eksbuild.1"},
  "podIdentityAgent": {"version": "v1.3.4-eksbuild.1"},
  "ebsCsiDriver": {
    "version": "v1.37.0-eksbuild.1",
    "serviceAccountRoleArn": "arn:aws:iam::{{account}}:role/{{env}}-ebs-csi"
  },
  "containerInsights": {"version": "v2.1.0-eksbuild.1", "configurationValues": {"tag": "{{env}}"}}
}"#;

const TABLE: &str = "tableName: orders-{{env}}
partitionKey:
  name: pk
  type: S
{{billing}}
removalPolicy: {{removal ?retain}}
";

fn setup() -> (TempDir, TemplateResolver) {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("eks")).unwrap();
    fs::create_dir_all(dir.path().join("dynamodb")).unwrap();
    fs::write(dir.path().join("eks/addons.json"), ADDONS).unwrap();
    fs::write(dir.path().join("eks/partial.json"), r#"{"vpcCni": {"version": "v1.19.0-eksbuild.1"}}"#).unwrap();
    fs::write(dir.path().join("dynamodb/orders.yaml"), TABLE).unwrap();
    let resolver = TemplateResolver::new(FilesystemSource::new(dir.path()));
    (dir, resolver)
}

#[test]
fn test_addons_end_to_end() {
    let (_dir, resolver) = setup();
    let reference = TemplateReference::new("eks/addons.json")
        .with_value("env", "prod")
        .with_value("account", "123456789012");

    let document = resolver.resolve(&reference).unwrap();
    assert!(!document.text().contains("{{"));
    assert!(document.text().contains("prod-ebs-csi"));

    let config: AddOnsConfig = ConfigMapper::parse(&document).unwrap();
    for (_, _, addon) in config.entries() {
        assert!(!addon.version.is_empty());
    }
    assert_eq!(
        config.ebs_csi_driver.service_account_role_arn.as_deref(),
        Some("arn:aws:iam::123456789012:role/prod-ebs-csi")
    );
    assert_eq!(
        config.vpc_cni.configuration_values.as_ref().unwrap()["env"]["CLUSTER"],
        "prod"
    );
}

#[test]
fn test_resolve_then_parse_is_idempotent() {
    let (_dir, resolver) = setup();
    let reference = TemplateReference::new("dynamodb/orders.yaml")
        .with_value("env", "prod")
        .with_value("billing", "onDemand: {}");

    let first = ResourceConfig::parse(ResourceKind::Table, &resolver.resolve(&reference).unwrap()).unwrap();
    let second = ResourceConfig::parse(ResourceKind::Table, &resolver.resolve(&reference).unwrap()).unwrap();
    assert_eq!(first, second);
    assert_eq!(first.resource_name(), Some("orders-prod"));
}

#[test]
fn test_missing_addon_fails_validation() {
    let (_dir, resolver) = setup();
    let document = resolver.resolve(&TemplateReference::new("eks/partial.json")).unwrap();

    let err = ConfigMapper::parse::<AddOnsConfig>(&document).unwrap_err();
    match &err {
        ConfigError::SchemaValidationFailure { schema, document, violations } => {
            assert_eq!(*schema, "AddOnsConfig");
            assert_eq!(document, "eks/partial.json");
            assert_eq!(violations[0].rule, ViolationRule::Required);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_billing_mutual_exclusion_through_templates() {
    let (_dir, resolver) = setup();

    let both = TemplateReference::new("dynamodb/orders.yaml")
        .with_value("env", "prod")
        .with_value("billing", "onDemand: {}\nprovisioned: {readCapacity: 5, writeCapacity: 5}");
    let err = ConfigMapper::parse::<TableConfig>(&resolver.resolve(&both).unwrap()).unwrap_err();
    assert_eq!(err.violations()[0].rule, ViolationRule::MutualExclusion);
    assert!(err.to_string().contains("onDemand"));
    assert!(err.to_string().contains("provisioned"));

    let neither = TemplateReference::new("dynamodb/orders.yaml")
        .with_value("env", "prod")
        .with_value("billing", "");
    let err = ConfigMapper::parse::<TableConfig>(&resolver.resolve(&neither).unwrap()).unwrap_err();
    assert_eq!(err.violations()[0].rule, ViolationRule::MutualExclusion);
}
