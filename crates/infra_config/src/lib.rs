//! # infra_config
//!
//! Typed, validated configuration for infrakit.
//!
//! A resolved template is mapped onto one schema per resource family. Parsing
//! either returns a fully valid value or fails with every violated rule and
//! the field path it applies to.
//!
//! ## Schemas
//!
//! - **TableConfig**: key schema, billing (exactly one of `onDemand` or
//!   `provisioned`), encryption, streams, indexes
//! - **QueueConfig**: FIFO naming, timeouts, dead-letter queue, encryption
//! - **RoleConfig**: trusted principal, managed policies, inline statements
//! - **AddOnsConfig**: the six managed cluster add-ons
//! - **ObservabilityCredentials**: secret payload for the observability stack
//!
//! ## Example
//!
//! ```rust
//! use infra_config::{ConfigMapper, QueueConfig};
//! use infra_templates::{DocumentFormat, ResolvedDocument};
//!
//! let document = ResolvedDocument::new("events.yaml", DocumentFormat::Yaml, "queueName: events\n");
//! let queue: QueueConfig = ConfigMapper::parse(&document)?;
//! assert_eq!(queue.visibility_timeout_seconds, 30);
//! # Ok::<(), infra_config::ConfigError>(())
//! ```

pub mod error;
pub mod mapper;
pub mod resource;
pub mod schemas;
pub mod validator;

pub use error::{ConfigError, ConfigResult};
pub use mapper::{ConfigMapper, ConfigSchema};
pub use resource::{ResourceConfig, ResourceKind};
pub use schemas::*;
pub use validator::{SchemaValidator, Violation, ViolationRule};
