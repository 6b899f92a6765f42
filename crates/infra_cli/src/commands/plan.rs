//! Plan command - Print a stack's provisioning order.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use super::{assembler, load_manifest, TargetArgs};
use crate::config::CliConfig;

#[derive(Args)]
pub struct PlanArgs {
    /// Stack manifest (YAML)
    #[arg(short, long)]
    stack: PathBuf,

    /// Secrets file (JSON or YAML map of secret id to payload)
    #[arg(long, env = "INFRAKIT_SECRETS")]
    secrets: Option<PathBuf>,

    /// Print the order as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    target: TargetArgs,
}

pub fn execute(args: PlanArgs, config: &CliConfig) -> Result<()> {
    let manifest = load_manifest(config, &args.target, &args.stack)?;
    info!("Planning stack: {}", manifest.stack);

    let mut stack = assembler(config, &args.target, args.secrets)?.assemble(&manifest)?;
    let order = stack.plan();

    if args.json {
        let plan = serde_json::json!({
            "stack": stack.stack,
            "order": order,
            "skipped": stack.skipped,
        });
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("📋 {} ({} units)", stack.stack, order.len());
    for (i, path) in order.iter().enumerate() {
        println!("   {}. {}", i + 1, path);
    }
    for skipped in &stack.skipped {
        println!("   ⚠️  skipped {} (secret '{}' is absent)", skipped.id, skipped.secret);
    }
    Ok(())
}
