//! # infra_secrets
//!
//! Secret lookup for infrakit.
//!
//! A [`SecretFetcher`] reads payloads from a [`SecretBackend`] with a
//! two-stage lookup (direct id, then the fully-qualified ARN) and reports
//! a missing secret as [`SecretLookupResult::Absent`] instead of an error.
//!
//! ## Example
//!
//! ```rust
//! use infra_config::ObservabilityCredentials;
//! use infra_core::AccountContext;
//! use infra_secrets::{MemorySecretBackend, SecretFetcher};
//!
//! let account = AccountContext::new("123456789012", "eu-west-1").unwrap();
//! let backend = MemorySecretBackend::new().with_secret(
//!     "arn:aws:secretsmanager:eu-west-1:123456789012:secret:grafana",
//!     r#"{"grafanaUrl": "https://grafana.example.com", "grafanaApiKey": "key"}"#,
//! );
//!
//! let fetcher = SecretFetcher::new(backend);
//! let credentials = fetcher.fetch::<ObservabilityCredentials>(&account, "grafana").unwrap();
//! assert!(credentials.is_present());
//! ```

pub mod backend;
pub mod error;
pub mod fetcher;
pub mod file;
pub mod memory;

pub use backend::{BackendError, SecretBackend};
pub use error::{SecretError, SecretResult};
pub use fetcher::{SecretFetcher, SecretLookupResult, SECRETS_SERVICE};
pub use file::FileSecretBackend;
pub use memory::MemorySecretBackend;
