//! # infra_core
//!
//! Core synthesis model for infrakit.
//!
//! This crate turns typed configuration objects into an ordered set of
//! provisioning units:
//!
//! - **Identity**: deterministic, collision-free construct identifiers
//! - **Graph**: provisioning units plus explicit ordering edges, cycle-checked
//!   on insertion
//! - **Adapter**: the boundary to the engine that provisions or synthesizes
//!   each unit
//! - **Executor**: a synthesis pass walking the graph in topological order
//!
//! # Example
//!
//! ```rust
//! use infra_core::{DependencyGraph, IdentifierGenerator, RecordingAdapter, ScopePath, SynthesisPass};
//!
//! let ids = IdentifierGenerator::new();
//! let scope = ScopePath::parse("cluster");
//! let mut graph = DependencyGraph::new();
//!
//! let observability = graph.add_unit(ids.construct(&scope, "AddOn", "observability")?, ())?;
//! let secrets = graph.add_unit(ids.construct(&scope, "AddOn", "secrets-store")?, ())?;
//! graph.add_edge(observability, secrets)?;
//!
//! let mut adapter = RecordingAdapter::new();
//! let log = SynthesisPass::new("cluster").run(&mut graph, &mut adapter)?;
//! assert_eq!(log.order, vec!["cluster/AddOn-observability", "cluster/AddOn-secrets-store"]);
//! # Ok::<(), infra_core::CoreError>(())
//! ```

pub mod adapter;
pub mod context;
pub mod error;
pub mod executor;
pub mod graph;
pub mod identity;

// Re-export main types for convenience
pub use adapter::{ProvisioningAdapter, RecordedCall, RecordingAdapter, ResourceHandle};
pub use context::{AccountContext, DEFAULT_PARTITION};
pub use error::{AdapterError, CoreError, CoreResult};
pub use executor::{PassState, SynthesisLog, SynthesisLogEntry, SynthesisPass};
pub use graph::{DependencyGraph, ProvisioningUnit, UnitId, UnitState};
pub use identity::{
    ConstructIdentity, IdentifierGenerator, IdentityRegistry, ScopePath, DEFAULT_DELIMITER,
    DEFAULT_MAX_LENGTH, SCOPE_SEPARATOR,
};
