//! CLI command definitions.
//!
//! Each subcommand maps to one stage of turning templates into a stack:
//! resolve, validate, identify, plan and synthesize.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use infra_secrets::{FileSecretBackend, SecretFetcher};
use infra_synth::{StackAssembler, StackManifest};
use infra_templates::{FilesystemSource, TemplateContext, TemplateResolver};

use crate::config::CliConfig;

pub mod identify;
pub mod plan;
pub mod resolve;
pub mod synth;
pub mod validate;

/// infrakit - typed infrastructure synthesis from templates
#[derive(Parser)]
#[command(name = "infrakit")]
#[command(version, about = "infrakit - typed infrastructure synthesis from templates")]
#[command(long_about = r#"
infrakit resolves parameterized YAML/JSON templates, validates them against
typed resource schemas, and synthesizes ordered stacks into CloudFormation.

WORKFLOWS:
  resolve   → Resolve a template against context values
  validate  → Validate a resolved template, or lint every template
  id        → Print the construct identifier for a kind and name
  plan      → Print a stack's provisioning order
  synth     → Synthesize a stack into a template and synthesis log

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Validation failure
  4 - Template error
  5 - Synthesis or dependency graph error
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Settings file (defaults to ./infrakit.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a template and print the document
    Resolve(resolve::ResolveArgs),

    /// Validate a template against a resource schema
    Validate(validate::ValidateArgs),

    /// Print the identifier and construct path for a kind and name
    Id(identify::IdentifyArgs),

    /// Print a stack's provisioning order
    Plan(plan::PlanArgs),

    /// Synthesize a stack
    Synth(synth::SynthArgs),
}

/// Failures raised by the commands themselves.
#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{failed} of {total} templates failed validation")]
    TemplatesFailed { failed: usize, total: usize },

    #[error("Account and region are required (--account/--region, CDK_DEFAULT_ACCOUNT/CDK_DEFAULT_REGION or infrakit.toml)")]
    MissingAccount,

    #[error("Invalid settings file {path:?}: {message}")]
    InvalidConfig { path: PathBuf, message: String },
}

/// Where templates live and which account they are resolved for.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Templates directory
    #[arg(long, env = "INFRAKIT_TEMPLATES")]
    pub templates_dir: Option<PathBuf>,

    /// Target account id
    #[arg(long, env = "CDK_DEFAULT_ACCOUNT")]
    pub account: Option<String>,

    /// Target region
    #[arg(long, env = "CDK_DEFAULT_REGION")]
    pub region: Option<String>,
}

/// Context values given on the command line.
#[derive(Args, Debug, Clone, Default)]
pub struct ContextArgs {
    /// Context value as KEY=VALUE (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_assignment)]
    pub values: Vec<(String, String)>,

    /// CDK-style context file (cdk.json, cdk.context.json or YAML)
    #[arg(long)]
    pub context_file: Option<PathBuf>,
}

/// Parse `key=value`; the value may itself contain `=`.
pub fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", raw)),
    }
}

pub fn resolver(config: &CliConfig, target: &TargetArgs) -> Result<TemplateResolver> {
    let dir = templates_dir(config, target)?;
    Ok(TemplateResolver::new(FilesystemSource::new(dir)))
}

pub fn templates_dir(config: &CliConfig, target: &TargetArgs) -> Result<PathBuf> {
    let dir = config.templates_dir(target.templates_dir.clone());
    if !dir.is_dir() {
        anyhow::bail!("Templates directory not found: {:?}", dir);
    }
    Ok(dir)
}

/// Account values, then the context file, then `--set` values.
pub fn build_context(config: &CliConfig, target: &TargetArgs, args: &ContextArgs) -> Result<TemplateContext> {
    let mut context = TemplateContext::new();
    if let Some(account) = config.account(target.account.clone(), target.region.clone())? {
        context.layer(account.context_values())?;
    }
    if let Some(file) = &args.context_file {
        let file_context = TemplateContext::from_file(file)
            .with_context(|| format!("Failed to load context file {:?}", file))?;
        context.merge(&file_context);
    }
    context.layer(args.values.iter().cloned())?;
    Ok(context)
}

/// Load a stack manifest. Account and region the manifest leaves out come
/// from `--account`/`--region` (or their environment variables), then the
/// settings; the partition comes from the settings.
pub fn load_manifest(config: &CliConfig, target: &TargetArgs, path: &Path) -> Result<StackManifest> {
    let mut manifest = StackManifest::load(path).with_context(|| format!("Failed to load stack {:?}", path))?;
    fill_target(&mut manifest, config, target)?;
    Ok(manifest)
}

fn fill_target(manifest: &mut StackManifest, config: &CliConfig, target: &TargetArgs) -> Result<()> {
    manifest.account = manifest
        .account
        .take()
        .or_else(|| target.account.clone())
        .or_else(|| config.account.clone());
    manifest.region = manifest
        .region
        .take()
        .or_else(|| target.region.clone())
        .or_else(|| config.region.clone());
    if manifest.account.is_none() || manifest.region.is_none() {
        return Err(CommandError::MissingAccount.into());
    }
    if manifest.partition.is_none() {
        manifest.partition = config.partition.clone();
    }
    Ok(())
}

pub fn assembler(config: &CliConfig, target: &TargetArgs, secrets: Option<PathBuf>) -> Result<StackAssembler> {
    let mut assembler = StackAssembler::new(resolver(config, target)?).with_identifiers(config.identifiers());
    if let Some(path) = config.secrets_file(secrets) {
        let backend = FileSecretBackend::load(&path)?;
        assembler = assembler.with_secrets(SecretFetcher::new(backend));
    }
    Ok(assembler)
}
