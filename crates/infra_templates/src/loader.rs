//! Template discovery and authoring checks.

use std::collections::BTreeSet;

use tracing::{info, warn};

use crate::error::TemplateResult;
use crate::renderer::TemplateRenderer;
use crate::resolver::DocumentFormat;
use crate::source::TemplateSource;

/// What a template needs from its context, or why it cannot be used.
#[derive(Debug, Clone)]
pub struct TemplateReport {
    pub template: String,
    pub format: Option<DocumentFormat>,
    pub valid: bool,
    pub required_keys: BTreeSet<String>,
    pub optional_keys: BTreeSet<String>,
    pub errors: Vec<String>,
}

impl TemplateReport {
    fn new(template: &str) -> Self {
        Self {
            template: template.to_string(),
            format: None,
            valid: true,
            required_keys: BTreeSet::new(),
            optional_keys: BTreeSet::new(),
            errors: Vec::new(),
        }
    }

    fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
        self.valid = false;
    }
}

/// Template loader.
pub struct TemplateLoader<S> {
    source: S,
    renderer: TemplateRenderer,
}

impl<S: TemplateSource> TemplateLoader<S> {
    /// Create a new template loader.
    pub fn new(source: S) -> Self {
        Self {
            source,
            renderer: TemplateRenderer::new(),
        }
    }

    /// All template paths the source serves.
    pub fn list(&self) -> TemplateResult<Vec<String>> {
        self.source.list()
    }

    /// Check a single template's placeholder syntax and collect its keys.
    pub fn inspect(&self, path: &str) -> TemplateReport {
        let mut report = TemplateReport::new(path);

        let content = match self.source.load(path) {
            Ok(content) => content,
            Err(e) => {
                report.add_error(e.to_string());
                return report;
            }
        };
        report.format = Some(DocumentFormat::detect(path, &content));

        match self.renderer.parse(path, &content) {
            Ok(parsed) => {
                for placeholder in parsed.placeholders() {
                    if placeholder.optional {
                        report.optional_keys.insert(placeholder.key.clone());
                    } else {
                        report.required_keys.insert(placeholder.key.clone());
                    }
                }
                // A key used both ways is effectively required.
                let required = report.required_keys.clone();
                report.optional_keys.retain(|k| !required.contains(k));
            }
            Err(e) => report.add_error(e.to_string()),
        }

        report
    }

    /// Inspect every template the source serves.
    pub fn inspect_all(&self) -> TemplateResult<Vec<TemplateReport>> {
        let paths = self.list()?;
        let reports: Vec<_> = paths.iter().map(|p| self.inspect(p)).collect();

        let invalid = reports.iter().filter(|r| !r.valid).count();
        if invalid > 0 {
            warn!("{} of {} templates failed inspection", invalid, reports.len());
        } else {
            info!("Inspected {} templates", reports.len());
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{BundledSource, FilesystemSource};
    use tempfile::tempdir;

    #[test]
    fn test_loader_empty_dir() {
        let temp = tempdir().unwrap();
        let loader = TemplateLoader::new(FilesystemSource::new(temp.path()));
        assert!(loader.inspect_all().unwrap().is_empty());
    }

    #[test]
    fn test_inspect_collects_keys() {
        let loader = TemplateLoader::new(
            BundledSource::new()
                .with_template("ok.yaml", "a: {{env}}\nb: {{tier?}}\nc: {{env?x}}\n")
                .with_template("bad.json", "{\"a\": \"{{env\"}"),
        );

        let ok = loader.inspect("ok.yaml");
        assert!(ok.valid);
        assert_eq!(ok.format, Some(DocumentFormat::Yaml));
        assert!(ok.required_keys.contains("env"));
        assert!(ok.optional_keys.contains("tier"));
        assert!(!ok.optional_keys.contains("env"));

        let bad = loader.inspect("bad.json");
        assert!(!bad.valid);
        assert_eq!(bad.errors.len(), 1);
    }
}
