//! The key/value service secrets are read from.

use thiserror::Error;

/// Failure reported by a secret backend.
///
/// `NotFound` is the only variant the fetcher treats as recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("no secret stored under '{0}'")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("{0}")]
    Other(String),
}

impl BackendError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

/// Read access to a secret store, queried by name or ARN.
#[cfg_attr(test, mockall::automock)]
pub trait SecretBackend {
    /// Raw payload stored under `secret_id`.
    fn get_secret_value(&self, secret_id: &str) -> Result<String, BackendError>;
}
