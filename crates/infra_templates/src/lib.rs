//! # infra_templates
//!
//! Template loading and placeholder resolution for infrakit.
//!
//! Templates are YAML or JSON documents with embedded `{{dotted.key}}`
//! placeholders. Resolution loads a template from a [`TemplateSource`],
//! substitutes values from a layered [`TemplateContext`] and yields a
//! [`ResolvedDocument`] that is ready to be parsed into a typed config.
//!
//! ## Example
//!
//! ```rust,no_run
//! use infra_templates::{FilesystemSource, TemplateReference, TemplateResolver};
//!
//! let resolver = TemplateResolver::new(FilesystemSource::new("templates"));
//! let reference = TemplateReference::new("eks/addons.json").with_value("env", "prod");
//!
//! let document = resolver.resolve(&reference).unwrap();
//! println!("{}", document.text());
//! ```

pub mod context;
pub mod error;
pub mod loader;
pub mod renderer;
pub mod resolver;
pub mod source;

pub use context::{flatten, TemplateContext};
pub use error::{TemplateError, TemplateResult};
pub use loader::{TemplateLoader, TemplateReport};
pub use renderer::{is_valid_key, ParsedTemplate, Placeholder, TemplateRenderer, ValueEscape};
pub use resolver::{DocumentFormat, ResolvedDocument, TemplateReference, TemplateResolver};
pub use source::{BundledSource, FilesystemSource, TemplateSource};
