//! Error types for stack assembly and synthesis.

use std::path::PathBuf;

use infra_config::ConfigError;
use infra_core::CoreError;
use infra_secrets::SecretError;
use infra_templates::TemplateError;
use thiserror::Error;

/// Result type alias for synthesis operations.
pub type SynthResult<T> = Result<T, SynthError>;

/// Errors that abort assembling or synthesizing a stack.
#[derive(Error, Debug)]
pub enum SynthError {
    #[error("Invalid stack manifest {path}: {message}")]
    InvalidManifest { path: PathBuf, message: String },

    #[error("Stack '{stack}' names no account and region")]
    MissingAccount { stack: String },

    #[error("Unit '{unit}' depends on unknown unit '{dependency}'")]
    UnknownDependency { unit: String, dependency: String },

    #[error("Unit '{unit}' declares a secret but no secret backend is configured")]
    NoSecretBackend { unit: String },

    #[error("Unit '{unit}': {source}")]
    Template {
        unit: String,
        #[source]
        source: TemplateError,
    },

    #[error("Unit '{unit}': {source}")]
    Config {
        unit: String,
        #[source]
        source: ConfigError,
    },

    #[error("Unit '{unit}': {source}")]
    Secret {
        unit: String,
        #[source]
        source: SecretError,
    },

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
