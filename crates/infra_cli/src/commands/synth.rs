//! Synth command - Synthesize a stack into a template and synthesis log.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use super::{assembler, load_manifest, TargetArgs};
use crate::config::CliConfig;

#[derive(Args)]
pub struct SynthArgs {
    /// Stack manifest (YAML)
    #[arg(short, long)]
    stack: PathBuf,

    /// Output directory
    #[arg(short, long, env = "INFRAKIT_OUT")]
    out: Option<PathBuf>,

    /// Secrets file (JSON or YAML map of secret id to payload)
    #[arg(long, env = "INFRAKIT_SECRETS")]
    secrets: Option<PathBuf>,

    #[command(flatten)]
    target: TargetArgs,
}

pub fn execute(args: SynthArgs, config: &CliConfig) -> Result<()> {
    let manifest = load_manifest(config, &args.target, &args.stack)?;
    let out_dir = config.out_dir(args.out);
    info!("Synthesizing stack {} into {:?}", manifest.stack, out_dir);

    let mut stack = assembler(config, &args.target, args.secrets)?
        .assemble(&manifest)
        .with_context(|| format!("Failed to assemble stack {}", manifest.stack))?;
    let output = stack
        .synthesize(&out_dir)
        .with_context(|| format!("Failed to synthesize stack {}", manifest.stack))?;

    println!("✅ Synthesized {} ({} units)", stack.stack, output.log.order.len());
    println!("   template: {}", output.template_path.display());
    println!("   log:      {}", output.manifest_path.display());
    for skipped in &stack.skipped {
        println!("   ⚠️  skipped {} (secret '{}' is absent)", skipped.id, skipped.secret);
    }
    Ok(())
}
