//! Synthesis pass: hand every unit to the adapter in dependency order.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::adapter::{ProvisioningAdapter, ResourceHandle};
use crate::error::{CoreError, CoreResult};
use crate::graph::{DependencyGraph, ProvisioningUnit};

/// Pass state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassState {
    /// Pass has not started
    #[default]
    Pending,
    /// Units are being provisioned
    Running,
    /// Every unit was provisioned
    Completed,
    /// The adapter failed on a unit
    Failed,
}

/// Log entry for one provisioned unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SynthesisLogEntry {
    pub unit: String,
    pub kind: String,
    pub predecessors: Vec<String>,
    pub handle: ResourceHandle,
}

/// Record of one synthesis pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SynthesisLog {
    pub pass_id: Uuid,
    pub stack: String,
    pub adapter: String,
    pub state: PassState,
    /// Unit paths in provisioning order
    pub order: Vec<String>,
    pub units: Vec<SynthesisLogEntry>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error: Option<String>,
}

impl SynthesisLog {
    pub fn new(stack: &str, adapter: &str) -> Self {
        Self {
            pass_id: Uuid::new_v4(),
            stack: stack.to_string(),
            adapter: adapter.to_string(),
            state: PassState::Pending,
            order: Vec::new(),
            units: Vec::new(),
            started_at: None,
            completed_at: None,
            error: None,
        }
    }

    /// Mark the pass failed with `error`.
    pub fn fail(&mut self, error: &CoreError) {
        self.state = PassState::Failed;
        self.error = Some(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    /// Save the log as pretty JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> CoreResult<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| CoreError::Serialization(e.to_string()))?;
        fs::write(path, json)?;
        debug!("Saved synthesis log to {:?}", path);
        Ok(())
    }

    /// Load a log from disk.
    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

/// Runs one synthesis pass over a dependency graph.
#[derive(Debug, Clone)]
pub struct SynthesisPass {
    stack: String,
}

impl SynthesisPass {
    pub fn new(stack: impl Into<String>) -> Self {
        Self {
            stack: stack.into(),
        }
    }

    /// Provision every unit in topological order.
    ///
    /// Stops at the first adapter error; handles of units provisioned before
    /// the failure stay attached to the graph.
    pub fn run<C, A>(&self, graph: &mut DependencyGraph<C>, adapter: &mut A) -> CoreResult<SynthesisLog>
    where
        A: ProvisioningAdapter<C>,
    {
        let mut log = SynthesisLog::new(&self.stack, adapter.name());
        self.run_into(graph, adapter, &mut log)?;
        Ok(log)
    }

    /// Same as [`run`](Self::run), but records into `log`, which is left in
    /// the `Failed` state with the error message when a unit fails.
    pub fn run_into<C, A>(
        &self,
        graph: &mut DependencyGraph<C>,
        adapter: &mut A,
        log: &mut SynthesisLog,
    ) -> CoreResult<()>
    where
        A: ProvisioningAdapter<C>,
    {
        log.state = PassState::Running;
        log.started_at = Some(Utc::now());

        match self.provision_all(graph, adapter, log) {
            Ok(()) => {
                log.state = PassState::Completed;
                log.completed_at = Some(Utc::now());
                info!("Synthesis of {} completed", self.stack);
                Ok(())
            }
            Err(e) => {
                log.fail(&e);
                Err(e)
            }
        }
    }

    fn provision_all<C, A>(
        &self,
        graph: &mut DependencyGraph<C>,
        adapter: &mut A,
        log: &mut SynthesisLog,
    ) -> CoreResult<()>
    where
        A: ProvisioningAdapter<C>,
    {
        let order = graph.topological_order();
        log.order = order.iter().map(|id| graph.path(*id)).collect();
        info!(
            "Starting synthesis of {} ({} units, adapter {})",
            self.stack,
            order.len(),
            adapter.name()
        );

        for (i, id) in order.iter().enumerate() {
            let path = graph.path(*id);
            info!("Provisioning unit [{}/{}]: {}", i + 1, order.len(), path);

            let (handle, entry) = {
                let unit = graph
                    .unit(*id)
                    .ok_or_else(|| CoreError::UnknownUnit(id.to_string()))?;
                let predecessors: Vec<&ProvisioningUnit<C>> = unit
                    .predecessors()
                    .iter()
                    .filter_map(|p| graph.unit(*p))
                    .collect();

                let handle = adapter.provision(unit, &predecessors).map_err(|source| {
                    error!("Provisioning {} failed: {}", path, source);
                    CoreError::Provisioning {
                        unit: path.clone(),
                        source,
                    }
                })?;

                let entry = SynthesisLogEntry {
                    unit: path.clone(),
                    kind: unit.identity().kind.clone(),
                    predecessors: predecessors.iter().map(|p| p.identity().path()).collect(),
                    handle: handle.clone(),
                };
                (handle, entry)
            };

            graph.set_handle(*id, handle);
            log.units.push(entry);
        }
        Ok(())
    }
}
