//! Template resolution: load a named template and substitute its context.
//!
//! How a value is written depends on the document format:
//!
//! - JSON: values are escaped as JSON string contents, so a placeholder must
//!   sit inside a string literal and a value can never change the document
//!   structure.
//! - YAML: values are inserted verbatim. A value may carry YAML of its own
//!   (a flow mapping, extra lines with their own keys), which lets a context
//!   value splice a fragment into the document. Context values therefore
//!   belong to the template author; quote the placeholder in the template
//!   (`name: '{{name}}'`) when a value must stay a plain scalar.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::context::TemplateContext;
use crate::error::TemplateResult;
use crate::renderer::{ParsedTemplate, TemplateRenderer, ValueEscape};
use crate::source::TemplateSource;

/// Serialization format of a template and of the document it resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Detect the format from the template path, falling back to sniffing
    /// the first non-blank character of the content.
    pub fn detect(path: &str, content: &str) -> Self {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);

        match extension.as_deref() {
            Some("json") => DocumentFormat::Json,
            Some("yaml") | Some("yml") => DocumentFormat::Yaml,
            _ => match content.trim_start().chars().next() {
                Some('{') | Some('[') => DocumentFormat::Json,
                _ => DocumentFormat::Yaml,
            },
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Json => "json",
            DocumentFormat::Yaml => "yaml",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A template path plus the values to substitute into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TemplateReference {
    path: String,
    context: BTreeMap<String, String>,
}

impl TemplateReference {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            context: BTreeMap::new(),
        }
    }

    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn with_values<K, V>(mut self, values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.context
            .extend(values.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn context(&self) -> &BTreeMap<String, String> {
        &self.context
    }
}

/// Template text after substitution, not yet parsed.
///
/// A resolved document never contains a placeholder taken from its template:
/// resolution fails instead of leaving one behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDocument {
    source: String,
    format: DocumentFormat,
    text: String,
}

impl ResolvedDocument {
    pub fn new(source: impl Into<String>, format: DocumentFormat, text: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            format,
            text: text.into(),
        }
    }

    /// Path of the template this document was resolved from.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn format(&self) -> DocumentFormat {
        self.format
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Resolves template references against a template source.
pub struct TemplateResolver {
    source: Box<dyn TemplateSource>,
    renderer: TemplateRenderer,
}

impl TemplateResolver {
    /// Create a new template resolver.
    pub fn new(source: impl TemplateSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            renderer: TemplateRenderer::new(),
        }
    }

    pub fn source(&self) -> &dyn TemplateSource {
        self.source.as_ref()
    }

    /// Resolve a reference using only the values it carries.
    pub fn resolve(&self, reference: &TemplateReference) -> TemplateResult<ResolvedDocument> {
        let context = TemplateContext::from(reference.context().clone());
        self.resolve_with(reference.path(), &context)
    }

    /// Resolve the template at `path` against a prepared context.
    pub fn resolve_with(&self, path: &str, context: &TemplateContext) -> TemplateResult<ResolvedDocument> {
        info!("Resolving template {} from {} source", path, self.source.name());

        let content = self.source.load(path)?;
        let format = DocumentFormat::detect(path, &content);
        let parsed = self.renderer.parse(path, &content)?;

        let escape = match format {
            DocumentFormat::Json => ValueEscape::JsonString,
            DocumentFormat::Yaml => ValueEscape::Verbatim,
        };
        let text = self.renderer.render(&parsed, context, escape)?;

        debug!("Resolved {} as {} ({} bytes)", path, format, text.len());
        Ok(ResolvedDocument::new(path, format, text))
    }

    /// Load and parse a template without substituting anything.
    pub fn parse_template(&self, path: &str) -> TemplateResult<ParsedTemplate> {
        let content = self.source.load(path)?;
        self.renderer.parse(path, &content)
    }
}

impl fmt::Debug for TemplateResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TemplateResolver")
            .field("source", &self.source.name())
            .finish()
    }
}
