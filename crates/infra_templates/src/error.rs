//! Error types for templates.

use thiserror::Error;

/// Result type alias for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Errors that can occur while loading or resolving templates.
///
/// None of these are transient: each one points at an authoring defect in a
/// template or in the context handed to it.
#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Template not found: {0}")]
    TemplateNotFound(String),

    #[error("Unresolved placeholder(s) in template {template}: {}", keys.join(", "))]
    UnresolvedPlaceholder { template: String, keys: Vec<String> },

    #[error("Malformed template {template} at line {line}, column {column}: {reason}")]
    MalformedTemplate {
        template: String,
        line: usize,
        column: usize,
        reason: String,
    },

    #[error("Invalid context value for {key}: {message}")]
    InvalidContext { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TemplateError {
    /// The template path this error refers to, when there is one.
    pub fn template(&self) -> Option<&str> {
        match self {
            TemplateError::TemplateNotFound(path) => Some(path),
            TemplateError::UnresolvedPlaceholder { template, .. }
            | TemplateError::MalformedTemplate { template, .. } => Some(template),
            _ => None,
        }
    }
}
