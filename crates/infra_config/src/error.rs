//! Error types for the config module.

use infra_templates::DocumentFormat;
use thiserror::Error;

use crate::validator::Violation;

/// Result type alias for config operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors that can occur while mapping a resolved document to a typed config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Schema validation failed for {schema} in '{document}': {}", summarize(.violations))]
    SchemaValidationFailure {
        schema: &'static str,
        document: String,
        violations: Vec<Violation>,
    },

    #[error("Invalid {format} document '{document}': {message}")]
    InvalidDocument {
        document: String,
        format: DocumentFormat,
        message: String,
    },

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),
}

impl ConfigError {
    /// Violations carried by a schema failure; empty for other errors.
    pub fn violations(&self) -> &[Violation] {
        match self {
            ConfigError::SchemaValidationFailure { violations, .. } => violations,
            _ => &[],
        }
    }
}

fn summarize(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
