//! In-memory secret backend.

use std::collections::{BTreeMap, BTreeSet};

use crate::backend::{BackendError, SecretBackend};

/// Secret backend holding payloads in memory.
///
/// Ids marked with [`deny`](MemorySecretBackend::deny) answer with
/// `AccessDenied`, which makes failure paths easy to exercise.
#[derive(Debug, Default, Clone)]
pub struct MemorySecretBackend {
    secrets: BTreeMap<String, String>,
    denied: BTreeSet<String>,
}

impl MemorySecretBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, payload: impl Into<String>) {
        self.secrets.insert(id.into(), payload.into());
    }

    pub fn with_secret(mut self, id: impl Into<String>, payload: impl Into<String>) -> Self {
        self.insert(id, payload);
        self
    }

    /// Refuse access to `id`.
    pub fn deny(mut self, id: impl Into<String>) -> Self {
        self.denied.insert(id.into());
        self
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.secrets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl SecretBackend for MemorySecretBackend {
    fn get_secret_value(&self, secret_id: &str) -> Result<String, BackendError> {
        if self.denied.contains(secret_id) {
            return Err(BackendError::AccessDenied(secret_id.to_string()));
        }
        self.secrets
            .get(secret_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(secret_id.to_string()))
    }
}
