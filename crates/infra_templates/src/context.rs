//! Layered substitution context.
//!
//! A context is built from several layers (account built-ins, CDK context
//! file, stack values, unit values, secrets). Later layers override earlier
//! ones key by key. Nested documents are flattened into dotted keys so a
//! template can address `{{hosted.eks.grafana.key}}`; keys written with `:`
//! separators in the source (`hosted:eks:grafana:key`) are kept verbatim.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use crate::error::{TemplateError, TemplateResult};
use crate::renderer::is_valid_key;

/// Key/value substitution source for template resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateContext {
    values: BTreeMap<String, String>,
}

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single value, overriding any previous layer.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> TemplateResult<()> {
        let key = key.into();
        if !is_valid_key(&key) {
            return Err(TemplateError::InvalidContext {
                message: "keys must start with a letter or '_' and contain only letters, digits, '_', '.', ':' or '-'".to_string(),
                key,
            });
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> TemplateResult<Self> {
        self.insert(key, value)?;
        Ok(self)
    }

    /// Apply a layer of flat values on top of this context.
    pub fn layer<K, V>(&mut self, values: impl IntoIterator<Item = (K, V)>) -> TemplateResult<()>
    where
        K: Into<String>,
        V: Into<String>,
    {
        for (key, value) in values {
            self.insert(key, value)?;
        }
        Ok(())
    }

    /// Apply a nested document as a layer, flattened under `prefix`.
    ///
    /// Keys no placeholder could address (feature flags such as
    /// `@aws-cdk/core:stackRelativeExports`) are skipped.
    pub fn layer_document(&mut self, prefix: Option<&str>, document: &Value) {
        for (key, value) in flatten(prefix, document) {
            if is_valid_key(&key) {
                self.values.insert(key, value);
            } else {
                debug!("Skipping context key not addressable by placeholders: {}", key);
            }
        }
    }

    /// Merge another context on top of this one.
    pub fn merge(&mut self, other: &TemplateContext) {
        self.values
            .extend(other.values.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Load a CDK-style context file (JSON or YAML).
    ///
    /// When the document has a top-level `context` object (as `cdk.json`
    /// does) only that object is used; otherwise the whole document is.
    pub fn from_file(path: impl AsRef<Path>) -> TemplateResult<Self> {
        let path = path.as_ref();
        debug!("Loading context file {:?}", path);
        let content = fs::read_to_string(path)?;

        let is_json = path
            .extension()
            .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
        let document: Value = if is_json {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };

        let scoped = match document.get("context") {
            Some(inner @ Value::Object(_)) => inner,
            _ => &document,
        };

        let mut context = Self::new();
        context.layer_document(None, scoped);
        Ok(context)
    }
}

impl From<BTreeMap<String, String>> for TemplateContext {
    fn from(values: BTreeMap<String, String>) -> Self {
        Self { values }
    }
}

/// Flatten a nested document into dotted keys.
///
/// Objects contribute their key as a segment, arrays their index. Strings are
/// taken verbatim, other scalars use their JSON text, `null` becomes empty.
pub fn flatten(prefix: Option<&str>, document: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    flatten_into(prefix.map(str::to_string), document, &mut out);
    out
}

fn flatten_into(path: Option<String>, value: &Value, out: &mut BTreeMap<String, String>) {
    let join = |segment: &str| match &path {
        Some(p) => format!("{}.{}", p, segment),
        None => segment.to_string(),
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                flatten_into(Some(join(key)), child, out);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                flatten_into(Some(join(&index.to_string())), child, out);
            }
        }
        scalar => {
            if let Some(key) = path {
                out.insert(key, scalar_text(scalar));
            }
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
