//! Id command - Print a construct identifier.

use anyhow::Result;
use clap::Args;

use infra_core::ScopePath;

use crate::config::CliConfig;

#[derive(Args)]
pub struct IdentifyArgs {
    /// Construct kind (e.g., Table, Queue, AddOn)
    #[arg(short, long)]
    kind: String,

    /// Resource name
    #[arg(short, long)]
    name: String,

    /// Enclosing scope, segments separated by '/'
    #[arg(short, long, default_value = "")]
    scope: String,
}

pub fn execute(args: IdentifyArgs, config: &CliConfig) -> Result<()> {
    let identity = config
        .identifiers()
        .construct(&ScopePath::parse(&args.scope), &args.kind, &args.name)?;

    println!("{}", identity.id);
    println!("{}", identity.path());
    Ok(())
}
