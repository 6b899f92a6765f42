//! Resolve command - Render a template against context values.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{build_context, resolver, ContextArgs, TargetArgs};
use crate::config::CliConfig;

#[derive(Args)]
pub struct ResolveArgs {
    /// Template path, relative to the templates directory
    #[arg(short, long)]
    template: String,

    /// Write the document to this file instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    context: ContextArgs,

    #[command(flatten)]
    target: TargetArgs,
}

pub fn execute(args: ResolveArgs, config: &CliConfig) -> Result<()> {
    info!("Resolving template: {}", args.template);

    let resolver = resolver(config, &args.target)?;
    let context = build_context(config, &args.target, &args.context)?;
    let document = resolver.resolve_with(&args.template, &context)?;

    match &args.output {
        Some(path) => {
            fs::write(path, document.text()).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Wrote {} document to {:?}", document.format(), path);
        }
        None => println!("{}", document.text()),
    }
    Ok(())
}
