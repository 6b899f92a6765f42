//! File-backed secret backend, an offline stand-in for a cloud secret service.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::backend::{BackendError, SecretBackend};
use crate::error::{SecretError, SecretResult};
use crate::memory::MemorySecretBackend;

/// Secrets read from a JSON or YAML map of id to payload.
///
/// String values are used as-is; objects are stored as their JSON text, so
/// `grafana: {grafanaUrl: ...}` behaves like a JSON secret string.
#[derive(Debug, Clone)]
pub struct FileSecretBackend {
    path: PathBuf,
    secrets: MemorySecretBackend,
}

impl FileSecretBackend {
    /// Load a secrets file.
    pub fn load(path: impl AsRef<Path>) -> SecretResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let invalid = |message: String| SecretError::InvalidSecretsFile {
            path: path.to_path_buf(),
            message,
        };

        let is_json = path.extension().map(|e| e == "json").unwrap_or(false);
        let document: Value = if is_json {
            serde_json::from_str(&content).map_err(|e| invalid(e.to_string()))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?
        };

        let entries = match document {
            Value::Object(entries) => entries,
            Value::Null => Default::default(),
            _ => return Err(invalid("expected a map of secret id to payload".to_string())),
        };

        let mut secrets = MemorySecretBackend::new();
        for (id, payload) in entries {
            let payload = match payload {
                Value::String(text) => text,
                other => other.to_string(),
            };
            secrets.insert(id, payload);
        }
        debug!("Loaded {} secret(s) from {:?}", secrets.len(), path);

        Ok(Self {
            path: path.to_path_buf(),
            secrets,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn len(&self) -> usize {
        self.secrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.secrets.is_empty()
    }
}

impl SecretBackend for FileSecretBackend {
    fn get_secret_value(&self, secret_id: &str) -> Result<String, BackendError> {
        self.secrets.get_secret_value(secret_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_yaml_secrets() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.yaml");
        fs::write(
            &path,
            "plain: token\n\
             arn:aws:secretsmanager:eu-west-1:123456789012:secret:grafana:\n  grafanaUrl: https://g.example.com\n  grafanaApiKey: k\n",
        )
        .unwrap();

        let backend = FileSecretBackend::load(&path).unwrap();
        assert_eq!(backend.len(), 2);
        assert_eq!(backend.get_secret_value("plain").unwrap(), "token");

        let payload = backend
            .get_secret_value("arn:aws:secretsmanager:eu-west-1:123456789012:secret:grafana")
            .unwrap();
        let value: Value = serde_json::from_str(&payload).unwrap();
        assert_eq!(value["grafanaApiKey"], "k");
    }

    #[test]
    fn test_rejects_non_map() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("secrets.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            FileSecretBackend::load(&path),
            Err(SecretError::InvalidSecretsFile { .. })
        ));
    }
}
