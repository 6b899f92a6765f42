//! Two-stage secret lookup.
//!
//! A reference is first tried as a direct secret id. If the backend has no
//! such secret, the fetcher retries once with the fully-qualified ARN built
//! from the account context. Only when both stages miss is the secret
//! reported absent; every other backend failure is an error.

use infra_config::{ConfigError, ConfigMapper, ConfigSchema};
use infra_core::AccountContext;
use infra_templates::DocumentFormat;
use tracing::{debug, info};

use crate::backend::{BackendError, SecretBackend};
use crate::error::{SecretError, SecretResult};

/// Outcome of a lookup that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretLookupResult<T> {
    Present(T),
    Absent,
}

impl<T> SecretLookupResult<T> {
    pub fn is_present(&self) -> bool {
        matches!(self, SecretLookupResult::Present(_))
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, SecretLookupResult::Absent)
    }

    pub fn into_option(self) -> Option<T> {
        match self {
            SecretLookupResult::Present(value) => Some(value),
            SecretLookupResult::Absent => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SecretLookupResult<U> {
        match self {
            SecretLookupResult::Present(value) => SecretLookupResult::Present(f(value)),
            SecretLookupResult::Absent => SecretLookupResult::Absent,
        }
    }
}

impl<T> From<Option<T>> for SecretLookupResult<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(SecretLookupResult::Absent, SecretLookupResult::Present)
    }
}

/// Secrets Manager service name used in fallback ARNs.
pub const SECRETS_SERVICE: &str = "secretsmanager";

/// Fetches secrets through a [`SecretBackend`].
pub struct SecretFetcher {
    backend: Box<dyn SecretBackend>,
}

impl SecretFetcher {
    pub fn new(backend: impl SecretBackend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Fully-qualified id tried when the direct lookup misses.
    pub fn fallback_id(account: &AccountContext, secret_ref: &str) -> String {
        account.arn(SECRETS_SERVICE, &format!("secret:{}", secret_ref))
    }

    /// Fetch the raw payload of `secret_ref`.
    pub fn fetch_raw(
        &self,
        account: &AccountContext,
        secret_ref: &str,
    ) -> SecretResult<SecretLookupResult<String>> {
        if secret_ref.trim().is_empty() {
            return Err(SecretError::InvalidReference(secret_ref.to_string()));
        }

        if let Some(payload) = self.lookup(secret_ref)? {
            debug!("Secret '{}' found by direct lookup", secret_ref);
            return Ok(SecretLookupResult::Present(payload));
        }

        if secret_ref.starts_with("arn:") {
            info!("Secret '{}' not found", secret_ref);
            return Ok(SecretLookupResult::Absent);
        }

        let fallback = Self::fallback_id(account, secret_ref);
        debug!("Secret '{}' not found, trying {}", secret_ref, fallback);
        match self.lookup(&fallback)? {
            Some(payload) => {
                debug!("Secret '{}' found as {}", secret_ref, fallback);
                Ok(SecretLookupResult::Present(payload))
            }
            None => {
                info!("Secret '{}' not found under its name or {}", secret_ref, fallback);
                Ok(SecretLookupResult::Absent)
            }
        }
    }

    /// Fetch `secret_ref` and parse its payload as `T`.
    pub fn fetch<T: ConfigSchema>(
        &self,
        account: &AccountContext,
        secret_ref: &str,
    ) -> SecretResult<SecretLookupResult<T>> {
        let payload = match self.fetch_raw(account, secret_ref)? {
            SecretLookupResult::Present(payload) => payload,
            SecretLookupResult::Absent => return Ok(SecretLookupResult::Absent),
        };

        let format = if payload.trim_start().starts_with('{') {
            DocumentFormat::Json
        } else {
            DocumentFormat::Yaml
        };
        ConfigMapper::parse_str::<T>(secret_ref, format, &payload)
            .map(SecretLookupResult::Present)
            .map_err(|e| SecretError::MalformedSecret {
                secret: secret_ref.to_string(),
                schema: T::NAME,
                message: describe(&e),
            })
    }

    fn lookup(&self, secret_id: &str) -> SecretResult<Option<String>> {
        match self.backend.get_secret_value(secret_id) {
            Ok(payload) => Ok(Some(payload)),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(source) => Err(SecretError::SecretBackendFailure {
                secret: secret_id.to_string(),
                source,
            }),
        }
    }
}

impl std::fmt::Debug for SecretFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretFetcher").finish_non_exhaustive()
    }
}

// Deserializer messages can quote payload values, so only paths and rules
// are reported.
fn describe(error: &ConfigError) -> String {
    match error {
        ConfigError::SchemaValidationFailure { violations, .. } => violations
            .iter()
            .map(|v| format!("{} [{}]", v.path, v.rule))
            .collect::<Vec<_>>()
            .join(", "),
        ConfigError::InvalidDocument { format, .. } => format!("payload is not valid {}", format),
        other => other.to_string(),
    }
}
