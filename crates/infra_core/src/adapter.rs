//! Boundary to the engine that turns units into resources.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::AdapterError;
use crate::graph::ProvisioningUnit;

/// What an adapter returns for a provisioned unit. Opaque to the core.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceHandle {
    /// Identifier the adapter assigned to the resource
    pub logical_id: String,
    /// Resource type (e.g., "AWS::SQS::Queue")
    pub resource_type: String,
    /// Adapter-specific attributes
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ResourceHandle {
    pub fn new(logical_id: impl Into<String>, resource_type: impl Into<String>) -> Self {
        Self {
            logical_id: logical_id.into(),
            resource_type: resource_type.into(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Engine that provisions or synthesizes a single unit.
///
/// Called once per unit in topological order; every predecessor has already
/// been provisioned and carries its handle.
pub trait ProvisioningAdapter<C> {
    /// Human-readable name of this adapter.
    fn name(&self) -> &str;

    /// Provision `unit` after its `predecessors`.
    fn provision(
        &mut self,
        unit: &ProvisioningUnit<C>,
        predecessors: &[&ProvisioningUnit<C>],
    ) -> Result<ResourceHandle, AdapterError>;
}

/// A provisioning call captured by [`RecordingAdapter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub unit: String,
    pub predecessors: Vec<String>,
}

/// Adapter that records calls instead of provisioning anything.
///
/// Useful for tests and dry runs; can be told to fail on given units.
#[derive(Debug, Default)]
pub struct RecordingAdapter {
    calls: Vec<RecordedCall>,
    fail_on: HashSet<String>,
}

impl RecordingAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail when asked to provision the unit at `path`.
    pub fn fail_on(mut self, path: impl Into<String>) -> Self {
        self.fail_on.insert(path.into());
        self
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    /// Unit paths in the order they were provisioned.
    pub fn provisioned(&self) -> Vec<&str> {
        self.calls.iter().map(|c| c.unit.as_str()).collect()
    }
}

impl<C> ProvisioningAdapter<C> for RecordingAdapter {
    fn name(&self) -> &str {
        "recording"
    }

    fn provision(
        &mut self,
        unit: &ProvisioningUnit<C>,
        predecessors: &[&ProvisioningUnit<C>],
    ) -> Result<ResourceHandle, AdapterError> {
        let path = unit.identity().path();
        if self.fail_on.contains(&path) {
            return Err(format!("refusing to provision {}", path).into());
        }

        self.calls.push(RecordedCall {
            unit: path.clone(),
            predecessors: predecessors.iter().map(|p| p.identity().path()).collect(),
        });
        Ok(ResourceHandle::new(path, unit.identity().kind.clone()))
    }
}
