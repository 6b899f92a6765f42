//! Error types for the secrets module.

use std::path::PathBuf;

use thiserror::Error;

use crate::backend::BackendError;

/// Result type alias for secret operations.
pub type SecretResult<T> = Result<T, SecretError>;

/// Hard failures of a secret lookup. Absence is not an error.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("Secret backend failed for '{secret}': {source}")]
    SecretBackendFailure {
        secret: String,
        #[source]
        source: BackendError,
    },

    #[error("Secret '{secret}' does not match {schema}: {message}")]
    MalformedSecret {
        secret: String,
        schema: &'static str,
        message: String,
    },

    #[error("Invalid secret reference: '{0}'")]
    InvalidReference(String),

    #[error("Invalid secrets file {path}: {message}")]
    InvalidSecretsFile { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
