//! Validate command - Check a template against a resource schema.

use anyhow::Result;
use clap::Args;
use tracing::info;

use infra_config::{ConfigError, ResourceConfig, ResourceKind};
use infra_templates::{FilesystemSource, TemplateLoader};

use super::{build_context, resolver, templates_dir, CommandError, ContextArgs, TargetArgs};
use crate::config::CliConfig;

#[derive(Args)]
pub struct ValidateArgs {
    /// Resource kind (table, queue, role, eks-addons)
    #[arg(short, long, required_unless_present = "all")]
    kind: Option<ResourceKind>,

    /// Template path, relative to the templates directory
    #[arg(short, long, required_unless_present = "all")]
    template: Option<String>,

    /// Lint the placeholder syntax of every template instead
    #[arg(long, conflicts_with_all = ["kind", "template"])]
    all: bool,

    #[command(flatten)]
    context: ContextArgs,

    #[command(flatten)]
    target: TargetArgs,
}

pub fn execute(args: ValidateArgs, config: &CliConfig) -> Result<()> {
    match (args.kind, args.template.as_deref()) {
        (Some(kind), Some(template)) if !args.all => validate_one(kind, template, &args, config),
        _ => lint_all(&args, config),
    }
}

fn validate_one(kind: ResourceKind, template: &str, args: &ValidateArgs, config: &CliConfig) -> Result<()> {
    info!("Validating {} as {}", template, kind);

    let resolver = resolver(config, &args.target)?;
    let context = build_context(config, &args.target, &args.context)?;
    let document = resolver.resolve_with(template, &context)?;

    match ResourceConfig::parse(kind, &document) {
        Ok(resource) => {
            let name = resource.resource_name().unwrap_or("-");
            println!("✅ {} is a valid {} ({})", template, kind, name);
            Ok(())
        }
        Err(err @ ConfigError::SchemaValidationFailure { .. }) => {
            println!("❌ {} is not a valid {}:", template, kind);
            for violation in err.violations() {
                println!("   - {}", violation);
            }
            Err(err.into())
        }
        Err(err) => Err(err.into()),
    }
}

fn lint_all(args: &ValidateArgs, config: &CliConfig) -> Result<()> {
    let dir = templates_dir(config, &args.target)?;
    info!("Linting templates in {:?}", dir);

    let loader = TemplateLoader::new(FilesystemSource::new(&dir));
    let reports = loader.inspect_all()?;
    if reports.is_empty() {
        println!("⚠️  No templates found in {:?}", dir);
        return Ok(());
    }

    let mut failed = 0;
    for report in &reports {
        if report.valid {
            println!(
                "✅ {} ({} required, {} optional keys)",
                report.template,
                report.required_keys.len(),
                report.optional_keys.len()
            );
        } else {
            failed += 1;
            println!("❌ {}", report.template);
            for error in &report.errors {
                println!("   - {}", error);
            }
        }
    }

    println!();
    println!("Results: {} passed, {} failed", reports.len() - failed, failed);
    if failed > 0 {
        return Err(CommandError::TemplatesFailed {
            failed,
            total: reports.len(),
        }
        .into());
    }
    Ok(())
}
