//! infrakit CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Validation failure
//! - 4: Template error
//! - 5: Synthesis or dependency graph error

use std::error::Error as StdError;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use infra_config::ConfigError;
use infra_core::CoreError;
use infra_secrets::SecretError;
use infra_synth::SynthError;
use infra_templates::TemplateError;

mod commands;
mod config;

use commands::{Cli, CommandError, Commands};
use config::CliConfig;

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const VALIDATION_FAILURE: u8 = 3;
    pub const TEMPLATE_ERROR: u8 = 4;
    pub const SYNTHESIS_ERROR: u8 = 5;
}

/// Crates whose logs are shown at the chosen level; everything else stays at warn.
const LOG_TARGETS: [&str; 6] = [
    "infra_cli",
    "infra_core",
    "infra_templates",
    "infra_config",
    "infra_secrets",
    "infra_synth",
];

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = CliConfig::load(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Resolve(args) => commands::resolve::execute(args, &config),
        Commands::Validate(args) => commands::validate::execute(args, &config),
        Commands::Id(args) => commands::identify::execute(args, &config),
        Commands::Plan(args) => commands::plan::execute(args, &config),
        Commands::Synth(args) => commands::synth::execute(args, &config),
    });

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "error"
    } else {
        "info"
    };
    let directives = LOG_TARGETS
        .iter()
        .fold("warn".to_string(), |acc, target| format!("{},{}={}", acc, target, level));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    // Already initialized when embedded; keep going.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    e.chain()
        .find_map(exit_code_for)
        .unwrap_or(ExitCodes::GENERAL_ERROR)
}

fn exit_code_for(cause: &(dyn StdError + 'static)) -> Option<u8> {
    if let Some(err) = cause.downcast_ref::<SynthError>() {
        return match err {
            SynthError::InvalidManifest { .. }
            | SynthError::MissingAccount { .. }
            | SynthError::NoSecretBackend { .. } => {
                Some(ExitCodes::INVALID_ARGS)
            }
            SynthError::UnknownDependency { .. } | SynthError::Core(_) => Some(ExitCodes::SYNTHESIS_ERROR),
            // Wrapped errors are classified by their source.
            _ => None,
        };
    }
    if let Some(err) = cause.downcast_ref::<SecretError>() {
        return match err {
            SecretError::MalformedSecret { .. } => Some(ExitCodes::VALIDATION_FAILURE),
            SecretError::InvalidReference(_) | SecretError::InvalidSecretsFile { .. } => {
                Some(ExitCodes::INVALID_ARGS)
            }
            _ => Some(ExitCodes::GENERAL_ERROR),
        };
    }
    if let Some(err) = cause.downcast_ref::<CommandError>() {
        return Some(match err {
            CommandError::TemplatesFailed { .. } => ExitCodes::VALIDATION_FAILURE,
            CommandError::MissingAccount | CommandError::InvalidConfig { .. } => ExitCodes::INVALID_ARGS,
        });
    }
    if cause.is::<TemplateError>() {
        Some(ExitCodes::TEMPLATE_ERROR)
    } else if cause.is::<ConfigError>() {
        Some(ExitCodes::VALIDATION_FAILURE)
    } else if cause.is::<CoreError>() {
        Some(ExitCodes::SYNTHESIS_ERROR)
    } else {
        None
    }
}
