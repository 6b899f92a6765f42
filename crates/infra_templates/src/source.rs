//! Backing stores that template text is read from.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::error::{TemplateError, TemplateResult};

/// File extensions recognised as templates.
pub const TEMPLATE_EXTENSIONS: [&str; 3] = ["json", "yaml", "yml"];

/// A place templates can be loaded from, addressed by relative path.
pub trait TemplateSource {
    /// Human-readable name of this source, used in logs.
    fn name(&self) -> &str;

    /// Load the raw text of the template at `path`.
    fn load(&self, path: &str) -> TemplateResult<String>;

    /// List every template path this source can serve, sorted.
    fn list(&self) -> TemplateResult<Vec<String>>;
}

/// Templates read from one or more directories.
///
/// Roots are searched in order and the first one holding the file wins, so a
/// project directory can shadow a shared one.
#[derive(Debug, Clone)]
pub struct FilesystemSource {
    roots: Vec<PathBuf>,
}

impl FilesystemSource {
    /// Create a source over a single root directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            roots: vec![root.into()],
        }
    }

    /// Add another root searched after the existing ones.
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.roots.push(root.into());
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Find the file backing `path`, if any root has it.
    pub fn locate(&self, path: &str) -> Option<PathBuf> {
        if !is_contained(Path::new(path)) {
            return None;
        }
        self.roots
            .iter()
            .map(|root| root.join(path))
            .find(|candidate| candidate.is_file())
    }
}

impl TemplateSource for FilesystemSource {
    fn name(&self) -> &str {
        "filesystem"
    }

    fn load(&self, path: &str) -> TemplateResult<String> {
        let file = self
            .locate(path)
            .ok_or_else(|| TemplateError::TemplateNotFound(path.to_string()))?;
        debug!("Loading template {} from {:?}", path, file);
        Ok(fs::read_to_string(file)?)
    }

    fn list(&self) -> TemplateResult<Vec<String>> {
        let mut paths = Vec::new();

        for root in &self.roots {
            if !root.exists() {
                continue;
            }
            for entry in WalkDir::new(root)
                .min_depth(1)
                .into_iter()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_type().is_file())
            {
                let has_template_ext = entry
                    .path()
                    .extension()
                    .and_then(|e| e.to_str())
                    .map_or(false, |ext| TEMPLATE_EXTENSIONS.contains(&ext));
                if !has_template_ext {
                    continue;
                }
                if let Ok(relative) = entry.path().strip_prefix(root) {
                    paths.push(to_template_path(relative));
                }
            }
        }

        paths.sort();
        paths.dedup();
        Ok(paths)
    }
}

/// Templates compiled into the binary or registered in memory.
#[derive(Debug, Clone, Default)]
pub struct BundledSource {
    templates: BTreeMap<String, String>,
}

impl BundledSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template under `path`, replacing any previous one.
    pub fn insert(&mut self, path: impl Into<String>, content: impl Into<String>) {
        self.templates.insert(path.into(), content.into());
    }

    pub fn with_template(mut self, path: impl Into<String>, content: impl Into<String>) -> Self {
        self.insert(path, content);
        self
    }
}

impl TemplateSource for BundledSource {
    fn name(&self) -> &str {
        "bundled"
    }

    fn load(&self, path: &str) -> TemplateResult<String> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| TemplateError::TemplateNotFound(path.to_string()))
    }

    fn list(&self) -> TemplateResult<Vec<String>> {
        Ok(self.templates.keys().cloned().collect())
    }
}

/// Relative paths only; `..` and absolute components would escape the root.
fn is_contained(path: &Path) -> bool {
    !path.as_os_str().is_empty()
        && path
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

fn to_template_path(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_filesystem_source_first_root_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::create_dir_all(first.path().join("sqs")).unwrap();
        fs::create_dir_all(second.path().join("sqs")).unwrap();
        fs::write(first.path().join("sqs/events.yaml"), "first").unwrap();
        fs::write(second.path().join("sqs/events.yaml"), "second").unwrap();
        fs::write(second.path().join("sqs/dlq.yaml"), "dlq").unwrap();

        let source = FilesystemSource::new(first.path()).with_root(second.path());
        assert_eq!(source.load("sqs/events.yaml").unwrap(), "first");
        assert_eq!(source.load("sqs/dlq.yaml").unwrap(), "dlq");
        assert_eq!(source.list().unwrap(), vec!["sqs/dlq.yaml", "sqs/events.yaml"]);
    }

    #[test]
    fn test_filesystem_source_rejects_escaping_paths() {
        let root = tempdir().unwrap();
        let source = FilesystemSource::new(root.path());

        let err = source.load("../etc/passwd").unwrap_err();
        assert!(matches!(err, TemplateError::TemplateNotFound(_)));
        assert!(source.locate("/etc/passwd").is_none());
    }

    #[test]
    fn test_bundled_source_missing_template() {
        let source = BundledSource::new().with_template("a.json", "{}");
        assert_eq!(source.load("a.json").unwrap(), "{}");
        assert!(matches!(
            source.load("b.json"),
            Err(TemplateError::TemplateNotFound(p)) if p == "b.json"
        ));
    }
}
