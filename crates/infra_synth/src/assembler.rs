//! Stack assembly: manifest in, ordered dependency graph out.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use infra_config::{ObservabilityCredentials, ResourceConfig};
use infra_core::{
    AccountContext, CoreError, DependencyGraph, IdentifierGenerator, ScopePath, SynthesisLog,
    SynthesisPass, UnitId,
};
use infra_secrets::{SecretError, SecretFetcher, SecretLookupResult};
use infra_templates::{TemplateContext, TemplateResolver};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cloud_assembly::CloudAssemblyAdapter;
use crate::error::{SynthError, SynthResult};
use crate::manifest::{SecretSchema, SecretSpec, StackManifest, UnitSpec};

/// Context key of the stack name.
pub const STACK_KEY: &str = "stack";

/// Name of the synthesis log written next to the template.
pub const MANIFEST_FILE: &str = "manifest.json";

/// A unit left out of the stack because its secret is absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedUnit {
    pub id: String,
    pub secret: String,
}

/// Files written by a synthesis.
#[derive(Debug, Clone)]
pub struct SynthesisOutput {
    pub template_path: PathBuf,
    pub manifest_path: PathBuf,
    pub log: SynthesisLog,
}

/// Result of assembling a manifest.
#[derive(Debug)]
pub struct AssembledStack {
    pub stack: String,
    pub account: AccountContext,
    pub graph: DependencyGraph<ResourceConfig>,
    pub skipped: Vec<SkippedUnit>,
}

impl AssembledStack {
    /// Construct paths in provisioning order.
    pub fn plan(&mut self) -> Vec<String> {
        let order = self.graph.topological_order();
        order.iter().map(|id| self.graph.path(*id)).collect()
    }

    /// Run a synthesis pass and write `<stack>.template.json` and
    /// `manifest.json` into `out_dir`.
    pub fn synthesize(&mut self, out_dir: impl AsRef<Path>) -> SynthResult<SynthesisOutput> {
        let out_dir = out_dir.as_ref();
        let mut adapter = CloudAssemblyAdapter::new(self.account.clone(), &self.stack);
        for skipped in &self.skipped {
            adapter.note_skipped(&skipped.id);
        }

        let manifest_path = out_dir.join(MANIFEST_FILE);
        let mut log = SynthesisLog::new(&self.stack, CloudAssemblyAdapter::NAME);
        if let Err(e) = SynthesisPass::new(&self.stack).run_into(&mut self.graph, &mut adapter, &mut log) {
            // No template for a failed pass, only the log saying why.
            log.save(&manifest_path)?;
            return Err(e.into());
        }

        fs::create_dir_all(out_dir)?;
        let template_path = out_dir.join(format!("{}.template.json", self.stack));
        fs::write(&template_path, serde_json::to_string_pretty(&adapter.template())?)?;
        log.save(&manifest_path)?;

        info!(
            "Synthesized {} ({} resources) to {:?}",
            self.stack,
            adapter.resource_count(),
            template_path
        );
        Ok(SynthesisOutput {
            template_path,
            manifest_path,
            log,
        })
    }
}

/// Builds a dependency graph from a stack manifest.
///
/// Owns the template resolver, the identifier generator and, when units need
/// secrets, a secret fetcher.
#[derive(Debug)]
pub struct StackAssembler {
    resolver: TemplateResolver,
    secrets: Option<SecretFetcher>,
    identifiers: IdentifierGenerator,
}

impl StackAssembler {
    pub fn new(resolver: TemplateResolver) -> Self {
        Self {
            resolver,
            secrets: None,
            identifiers: IdentifierGenerator::new(),
        }
    }

    pub fn with_secrets(mut self, fetcher: SecretFetcher) -> Self {
        self.secrets = Some(fetcher);
        self
    }

    pub fn with_identifiers(mut self, identifiers: IdentifierGenerator) -> Self {
        self.identifiers = identifiers;
        self
    }

    pub fn identifiers(&self) -> &IdentifierGenerator {
        &self.identifiers
    }

    /// Context shared by every unit: account values, then the context file,
    /// then the manifest's own values.
    pub fn base_context(&self, manifest: &StackManifest, account: &AccountContext) -> SynthResult<TemplateContext> {
        let mut context = TemplateContext::new();
        let stack = [(STACK_KEY, manifest.stack.clone())];
        context
            .layer(account.context_values().into_iter().chain(stack))
            .map_err(|source| SynthError::Template {
                unit: manifest.stack.clone(),
                source,
            })?;

        if let Some(file) = &manifest.context_file {
            let file_context = TemplateContext::from_file(file).map_err(|source| SynthError::Template {
                unit: manifest.stack.clone(),
                source,
            })?;
            context.merge(&file_context);
        }

        context.layer_document(None, &Value::Object(manifest.context.clone()));
        Ok(context)
    }

    /// Resolve, parse and link every unit of `manifest`.
    pub fn assemble(&self, manifest: &StackManifest) -> SynthResult<AssembledStack> {
        let account = manifest.account_context()?;
        let scope = ScopePath::root().child(manifest.stack.clone())?;
        info!(
            "Assembling stack {} ({} units) for {}/{}",
            manifest.stack,
            manifest.units.len(),
            account.account,
            account.region
        );

        let ids = self.unit_ids(manifest)?;
        let base = self.base_context(manifest, &account)?;

        let mut graph = DependencyGraph::new();
        let mut declared: HashMap<&str, UnitId> = HashMap::new();
        let mut skipped = Vec::new();

        for (unit, id) in manifest.units.iter().zip(&ids) {
            let mut context = base.clone();
            context.layer_document(None, &Value::Object(unit.context.clone()));

            if let Some(secret) = &unit.secret {
                match self.fetch_secret(id, secret, &account)? {
                    Some(values) => context.layer_document(Some(&format!("secrets.{}", secret.alias)), &values),
                    None => {
                        warn!(
                            "Skipping unit {}: secret '{}' is absent",
                            id, secret.secret_ref
                        );
                        skipped.push(SkippedUnit {
                            id: id.clone(),
                            secret: secret.secret_ref.clone(),
                        });
                        continue;
                    }
                }
            }

            let config = self.resolve_unit(id, unit, &context)?;
            let identity = self
                .identifiers
                .construct(&scope, unit.kind.construct_kind(), &unit.name)?;
            let unit_id = graph.add_unit(identity, config)?;
            declared.insert(id.as_str(), unit_id);
        }

        let after: BTreeMap<&str, &[String]> = manifest
            .units
            .iter()
            .zip(&ids)
            .map(|(unit, id)| (id.as_str(), unit.after.as_slice()))
            .collect();

        for id in &ids {
            let Some(&to) = declared.get(id.as_str()) else {
                continue;
            };
            let mut visiting = vec![id.as_str()];
            for predecessor in effective_predecessors(id, &after, &declared, &mut visiting)? {
                graph.add_edge(predecessor, to)?;
            }
        }

        info!(
            "Assembled {}: {} units, {} skipped",
            manifest.stack,
            graph.len(),
            skipped.len()
        );
        Ok(AssembledStack {
            stack: manifest.stack.clone(),
            account,
            graph,
            skipped,
        })
    }

    /// Identifiers of every unit, with every `after` target checked.
    fn unit_ids(&self, manifest: &StackManifest) -> SynthResult<Vec<String>> {
        let ids = manifest
            .units
            .iter()
            .map(|unit| self.identifiers.identify(unit.kind.construct_kind(), &unit.name))
            .collect::<Result<Vec<_>, CoreError>>()?;

        for (unit, id) in manifest.units.iter().zip(&ids) {
            if let Some(missing) = unit.after.iter().find(|dep| !ids.contains(dep)) {
                return Err(SynthError::UnknownDependency {
                    unit: id.clone(),
                    dependency: missing.clone(),
                });
            }
        }
        Ok(ids)
    }

    /// Secret values for the context, or `None` when the secret is absent.
    fn fetch_secret(
        &self,
        unit: &str,
        secret: &SecretSpec,
        account: &AccountContext,
    ) -> SynthResult<Option<Value>> {
        let fetcher = self.secrets.as_ref().ok_or_else(|| SynthError::NoSecretBackend {
            unit: unit.to_string(),
        })?;
        let wrap = |source: SecretError| SynthError::Secret {
            unit: unit.to_string(),
            source,
        };

        let values = match secret.schema {
            SecretSchema::Observability => fetcher
                .fetch::<ObservabilityCredentials>(account, &secret.secret_ref)
                .map_err(wrap)?
                .into_option()
                .map(serde_json::to_value)
                .transpose()?,
            SecretSchema::Json => match fetcher.fetch_raw(account, &secret.secret_ref).map_err(wrap)? {
                SecretLookupResult::Present(raw) => Some(
                    serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw)),
                ),
                SecretLookupResult::Absent => None,
            },
        };
        Ok(values)
    }

    fn resolve_unit(&self, id: &str, unit: &UnitSpec, context: &TemplateContext) -> SynthResult<ResourceConfig> {
        let document = self
            .resolver
            .resolve_with(&unit.template, context)
            .map_err(|source| SynthError::Template {
                unit: id.to_string(),
                source,
            })?;
        let config = ResourceConfig::parse(unit.kind, &document).map_err(|source| SynthError::Config {
            unit: id.to_string(),
            source,
        })?;
        debug!("Resolved unit {} from {}", id, unit.template);
        Ok(config)
    }
}

/// Declared predecessors of `id`, looking through skipped units to their own
/// predecessors.
fn effective_predecessors<'a>(
    id: &'a str,
    after: &BTreeMap<&'a str, &'a [String]>,
    declared: &HashMap<&str, UnitId>,
    visiting: &mut Vec<&'a str>,
) -> SynthResult<Vec<UnitId>> {
    let mut result = Vec::new();
    for dependency in after.get(id).copied().unwrap_or_default() {
        let dependency = dependency.as_str();
        if let Some(&unit) = declared.get(dependency) {
            if !result.contains(&unit) {
                result.push(unit);
            }
            continue;
        }

        if visiting.contains(&dependency) {
            return Err(CoreError::CyclicDependency {
                from: dependency.to_string(),
                to: id.to_string(),
            }
            .into());
        }
        visiting.push(dependency);
        for unit in effective_predecessors(dependency, after, declared, visiting)? {
            if !result.contains(&unit) {
                result.push(unit);
            }
        }
        visiting.pop();
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use infra_secrets::MemorySecretBackend;
    use infra_templates::BundledSource;

    const TABLE: &str = "tableName: orders-{{env}}\npartitionKey: {name: pk, type: S}\nonDemand: {}\n";
    const QUEUE: &str = "queueName: {{name}}-{{env}}\n";
    const GRAFANA: &str = "roleName: grafana-{{env}}\nassumedBy: {federated: '{{secrets.grafana.grafanaUrl}}'}\n";

    fn resolver() -> TemplateResolver {
        TemplateResolver::new(
            BundledSource::new()
                .with_template("table.yaml", TABLE)
                .with_template("queue.yaml", QUEUE)
                .with_template("grafana.yaml", GRAFANA),
        )
    }

    fn manifest(yaml: &str) -> StackManifest {
        let header = "stack: orders-prod\naccount: '123456789012'\nregion: eu-west-1\ncontext: {env: prod}\n";
        serde_yaml::from_str(&format!("{}{}", header, yaml)).unwrap()
    }

    #[test]
    fn test_assemble_orders_edges() {
        let manifest = manifest(
            "units:
  - {kind: queue, name: events, template: queue.yaml, context: {name: events}, after: [Table-orders]}
  - {kind: table, name: orders, template: table.yaml}
",
        );
        let mut stack = StackAssembler::new(resolver()).assemble(&manifest).unwrap();
        assert_eq!(stack.plan(), vec!["orders-prod/Table-orders", "orders-prod/Queue-events"]);
        assert!(stack.skipped.is_empty());
    }

    #[test]
    fn test_unknown_dependency() {
        let manifest = manifest(
            "units:
  - {kind: table, name: orders, template: table.yaml, after: [Queue-missing]}
",
        );
        let err = StackAssembler::new(resolver()).assemble(&manifest).unwrap_err();
        assert!(matches!(err, SynthError::UnknownDependency { ref dependency, .. } if dependency == "Queue-missing"));
    }

    #[test]
    fn test_absent_secret_skips_and_rewires() {
        let manifest = manifest(
            "units:
  - {kind: table, name: orders, template: table.yaml}
  - kind: role
    name: grafana
    template: grafana.yaml
    after: [Table-orders]
    secret: {ref: grafana, alias: grafana, schema: observability}
  - {kind: queue, name: events, template: queue.yaml, context: {name: events}, after: [Role-grafana]}
",
        );
        let assembler = StackAssembler::new(resolver()).with_secrets(SecretFetcher::new(MemorySecretBackend::new()));
        let mut stack = assembler.assemble(&manifest).unwrap();

        assert_eq!(stack.skipped.len(), 1);
        assert_eq!(stack.skipped[0].id, "Role-grafana");
        assert_eq!(stack.graph.len(), 2);

        let table = stack.graph.find("orders-prod/Table-orders").unwrap();
        let queue = stack.graph.find("orders-prod/Queue-events").unwrap();
        assert_eq!(stack.graph.edges(), vec![(table, queue)]);
        assert_eq!(stack.plan(), vec!["orders-prod/Table-orders", "orders-prod/Queue-events"]);
    }

    #[test]
    fn test_present_secret_feeds_context() {
        let backend = MemorySecretBackend::new().with_secret(
            "arn:aws:secretsmanager:eu-west-1:123456789012:secret:grafana",
            r#"{"grafanaUrl": "https://grafana.example.com", "grafanaApiKey": "k"}"#,
        );
        let manifest = manifest(
            "units:
  - kind: role
    name: grafana
    template: grafana.yaml
    secret: {ref: grafana, alias: grafana, schema: observability}
",
        );
        let assembler = StackAssembler::new(resolver()).with_secrets(SecretFetcher::new(backend));
        let stack = assembler.assemble(&manifest).unwrap();

        let unit = stack.graph.units().next().unwrap();
        match unit.config() {
            ResourceConfig::Role(role) => {
                assert_eq!(role.assumed_by.federated.as_deref(), Some("https://grafana.example.com"));
                assert_eq!(role.role_name, "grafana-prod");
            }
            other => panic!("unexpected config: {other:?}"),
        }
    }

    #[test]
    fn test_secret_without_backend() {
        let manifest = manifest(
            "units:
  - kind: role
    name: grafana
    template: grafana.yaml
    secret: {ref: grafana, alias: grafana}
",
        );
        let err = StackAssembler::new(resolver()).assemble(&manifest).unwrap_err();
        assert!(matches!(err, SynthError::NoSecretBackend { .. }));
    }

    #[test]
    fn test_duplicate_unit_collides() {
        let manifest = manifest(
            "units:
  - {kind: table, name: orders, template: table.yaml}
  - {kind: table, name: orders, template: table.yaml}
",
        );
        let err = StackAssembler::new(resolver()).assemble(&manifest).unwrap_err();
        assert!(matches!(err, SynthError::Core(CoreError::IdentifierCollision { .. })));
    }

    #[test]
    fn test_template_failure_names_unit() {
        let manifest = manifest(
            "units:
  - {kind: queue, name: events, template: queue.yaml}
",
        );
        let err = StackAssembler::new(resolver()).assemble(&manifest).unwrap_err();
        assert!(matches!(err, SynthError::Template { ref unit, .. } if unit == "Queue-events"));
        assert!(err.to_string().contains("name"));
    }
}
