//! End-to-end synthesis from templates on disk.

use std::fs;
use std::path::Path;

use infra_core::{PassState, SynthesisLog};
use infra_secrets::{FileSecretBackend, MemorySecretBackend, SecretFetcher};
use infra_synth::{CloudAssemblyAdapter, StackAssembler, StackManifest, SynthError};
use infra_templates::{FilesystemSource, TemplateResolver};
use serde_json::Value;
use tempfile::TempDir;

const STACK: &str = "stack: orders-prod
account: '123456789012'
region: eu-west-1
contextFile: cdk.context.json
units:
  - kind: table
    name: orders
    template: dynamodb/orders.yaml
  - kind: role
    name: grafana
    template: iam/grafana.yaml
    after: [Table-orders]
    secret: {ref: hosted/grafana, alias: grafana, schema: observability}
  - kind: queue
    name: events
    template: sqs/events.json
    context: {queue: events}
    after: [Role-grafana]
";

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(
        root,
        "templates/dynamodb/orders.yaml",
        "tableName: orders-{{env}}\npartitionKey: {name: pk, type: S}\nonDemand: {}\nremovalPolicy: {{removal ?retain}}\n",
    );
    write(
        root,
        "templates/iam/grafana.yaml",
        "roleName: grafana-{{env}}\nassumedBy: {federated: '{{secrets.grafana.grafanaUrl}}'}\n",
    );
    write(
        root,
        "templates/sqs/events.json",
        r#"{"queueName": "{{queue}}-{{env}}", "visibilityTimeoutSeconds": 60}"#,
    );
    write(root, "stacks/cdk.context.json", r#"{"context": {"env": "prod"}}"#);
    write(root, "stacks/orders.yaml", STACK);
    dir
}

fn assembler(root: &Path, secrets: &str) -> StackAssembler {
    let path = root.join("secrets.json");
    fs::write(&path, secrets).unwrap();
    StackAssembler::new(TemplateResolver::new(FilesystemSource::new(root.join("templates"))))
        .with_secrets(SecretFetcher::new(FileSecretBackend::load(&path).unwrap()))
}

#[test]
fn test_synthesize_with_secret() {
    let dir = workspace();
    let root = dir.path();
    let manifest = StackManifest::load(root.join("stacks/orders.yaml")).unwrap();
    let assembler = assembler(
        root,
        r#"{"hosted/grafana": {"grafanaUrl": "https://grafana.example.com", "grafanaApiKey": "glsa_secret"}}"#,
    );

    let mut stack = assembler.assemble(&manifest).unwrap();
    assert_eq!(
        stack.plan(),
        vec!["orders-prod/Table-orders", "orders-prod/Role-grafana", "orders-prod/Queue-events"]
    );

    let output = stack.synthesize(root.join("cdk.out")).unwrap();
    assert!(output.template_path.ends_with("orders-prod.template.json"));

    let template: Value = serde_json::from_str(&fs::read_to_string(&output.template_path).unwrap()).unwrap();
    let resources = template["Resources"].as_object().unwrap();
    assert_eq!(resources.len(), 3);
    let role = &resources[&CloudAssemblyAdapter::logical_id("orders-prod/Role-grafana")];
    assert_eq!(role["Properties"]["RoleName"], "grafana-prod");
    assert!(!template.to_string().contains("glsa_secret"));

    let log = SynthesisLog::load(&output.manifest_path).unwrap();
    assert_eq!(log.state, PassState::Completed);
    assert_eq!(log.order.len(), 3);
}

#[test]
fn test_absent_secret_skips_unit() {
    let dir = workspace();
    let root = dir.path();
    let manifest = StackManifest::load(root.join("stacks/orders.yaml")).unwrap();

    let mut stack = assembler(root, "{}").assemble(&manifest).unwrap();
    assert_eq!(stack.skipped.len(), 1);
    assert_eq!(stack.plan(), vec!["orders-prod/Table-orders", "orders-prod/Queue-events"]);

    let output = stack.synthesize(root.join("cdk.out")).unwrap();
    let template: Value = serde_json::from_str(&fs::read_to_string(&output.template_path).unwrap()).unwrap();
    let queue = &template["Resources"][&CloudAssemblyAdapter::logical_id("orders-prod/Queue-events")];
    assert_eq!(
        queue["DependsOn"],
        serde_json::json!([CloudAssemblyAdapter::logical_id("orders-prod/Table-orders")])
    );
    assert_eq!(template["Metadata"]["SkippedUnits"][0], "Role-grafana");
}

#[test]
fn test_malformed_secret_aborts() {
    let dir = workspace();
    let root = dir.path();
    let manifest = StackManifest::load(root.join("stacks/orders.yaml")).unwrap();

    let err = assembler(root, r#"{"hosted/grafana": {"grafanaUrl": "https://grafana.example.com"}}"#)
        .assemble(&manifest)
        .unwrap_err();
    assert!(matches!(err, SynthError::Secret { ref unit, .. } if unit == "Role-grafana"));
}

#[test]
fn test_bundled_sample_stack() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("../..");
    let manifest = StackManifest::load(root.join("stacks/orders.yaml")).unwrap();
    let assembler = StackAssembler::new(TemplateResolver::new(FilesystemSource::new(root.join("templates"))))
        .with_secrets(SecretFetcher::new(MemorySecretBackend::new()));

    let mut stack = assembler.assemble(&manifest).unwrap();
    assert_eq!(stack.skipped.len(), 1);
    assert_eq!(
        stack.plan(),
        vec![
            "orders-prod/Table-orders",
            "orders-prod/Queue-events",
            "orders-prod/EksAddOns-platform",
        ]
    );

    let out = TempDir::new().unwrap();
    let output = stack.synthesize(out.path()).unwrap();
    let template: Value = serde_json::from_str(&fs::read_to_string(&output.template_path).unwrap()).unwrap();
    let coredns = &template["Resources"][&CloudAssemblyAdapter::logical_id("orders-prod/EksAddOns-platform/coreDns")];
    assert_eq!(coredns["Properties"]["ClusterName"], "platform-prod");
    assert_eq!(coredns["Properties"]["ResolveConflicts"], "PRESERVE");
}
