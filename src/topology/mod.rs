//! Workflow topology resolution.
//!
//! Works out which process model a project runs under and maps its
//! free-text, user-customized status names onto the three canonical
//! phases. Status labels are ambiguous across item types ("Investigating"
//! may be active work for a Bug but triage for a Story), so a per-type map
//! is consulted before the project-wide one.

mod detect;

pub use detect::BoardDetector;

use std::collections::BTreeMap;

use serde::Serialize;

use crate::core::{DataFeed, DegradationReport, FallbackResult, RetryConfig};
use crate::model::Phase;
use crate::source::{fetch_with_retry, SchemaStatus, TrackerSource, WorkflowSchema};

/// Status name → phase mapping for one project.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WorkflowTopology {
    /// Project-wide mapping, keyed by normalized status name
    global: BTreeMap<String, Phase>,
    /// Item type (normalized) → status (normalized) → phase
    by_item_type: BTreeMap<String, BTreeMap<String, Phase>>,
    /// Statuses that mean work has started, in schema order
    start_statuses: Vec<String>,
    /// Statuses that mean work is finished, in schema order
    done_statuses: Vec<String>,
}

/// Case- and whitespace-insensitive lookup key.
fn normalize(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

impl WorkflowTopology {
    /// Create an empty topology. Every status resolves to `NotStarted`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a topology from a workflow schema.
    ///
    /// The project-wide list wins over statuses first seen under an item
    /// type; within one list the first occurrence of a name wins.
    pub fn from_schema(schema: &WorkflowSchema) -> Self {
        let mut topology = Self::new();

        for status in &schema.statuses {
            topology.insert_global(status);
        }

        for group in &schema.by_item_type {
            let type_key = normalize(&group.item_type);
            if type_key.is_empty() {
                continue;
            }
            for status in &group.statuses {
                topology.insert_global(status);
                let phase = Phase::from_category(&status.category);
                topology
                    .by_item_type
                    .entry(type_key.clone())
                    .or_default()
                    .entry(normalize(&status.name))
                    .or_insert(phase);
            }
        }

        topology
    }

    fn insert_global(&mut self, status: &SchemaStatus) {
        let key = normalize(&status.name);
        if key.is_empty() || self.global.contains_key(&key) {
            return;
        }
        let phase = Phase::from_category(&status.category);
        self.global.insert(key, phase);
        match phase {
            Phase::InProgress => self.start_statuses.push(status.name.trim().to_string()),
            Phase::Done => self.done_statuses.push(status.name.trim().to_string()),
            Phase::NotStarted => {}
        }
    }

    /// Map a status name project-wide.
    pub fn with_status(mut self, name: &str, phase: Phase) -> Self {
        let category = match phase {
            Phase::NotStarted => "new",
            Phase::InProgress => "indeterminate",
            Phase::Done => "done",
        };
        self.insert_global(&SchemaStatus::new(name, category));
        self
    }

    /// Map a status name for one item type only.
    pub fn with_type_override(mut self, item_type: &str, name: &str, phase: Phase) -> Self {
        self.by_item_type.entry(normalize(item_type)).or_default().insert(normalize(name), phase);
        self
    }

    /// Resolve a status name to a phase.
    ///
    /// Tries the item type's own mapping, then the project-wide mapping,
    /// and defaults to `NotStarted`. Never fails.
    pub fn resolve_phase(&self, status: &str, item_type: Option<&str>) -> Phase {
        let key = normalize(status);

        if let Some(phase) = item_type
            .map(normalize)
            .and_then(|t| self.by_item_type.get(&t))
            .and_then(|statuses| statuses.get(&key))
        {
            return *phase;
        }

        self.global.get(&key).copied().unwrap_or(Phase::NotStarted)
    }

    /// Statuses that mean work has started.
    pub fn start_statuses(&self) -> &[String] {
        &self.start_statuses
    }

    /// Statuses that mean work is finished.
    pub fn done_statuses(&self) -> &[String] {
        &self.done_statuses
    }

    /// Number of distinct project-wide statuses.
    pub fn len(&self) -> usize {
        self.global.len()
    }

    pub fn is_empty(&self) -> bool {
        self.global.is_empty() && self.by_item_type.is_empty()
    }
}

/// Builds workflow topologies from a tracker source.
///
/// Stateless; construct one per request.
pub struct TopologyResolver<'a> {
    source: &'a dyn TrackerSource,
    retry: RetryConfig,
}

impl<'a> TopologyResolver<'a> {
    pub fn new(source: &'a dyn TrackerSource) -> Self {
        Self { source, retry: RetryConfig::fetch() }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Fetch the workflow schema and build the topology.
    ///
    /// Falls back to an empty topology when the schema is unavailable.
    pub async fn build_topology(&self, project_key: &str) -> FallbackResult<WorkflowTopology> {
        let fetched = fetch_with_retry(&self.retry, "workflow schema", || {
            self.source.workflow_schema(project_key)
        })
        .await;

        match fetched {
            Ok(schema) => {
                let topology = WorkflowTopology::from_schema(&schema);
                tracing::debug!(
                    project = project_key,
                    statuses = topology.len(),
                    "Built workflow topology"
                );
                FallbackResult::primary(topology)
            }
            Err(e) => {
                let mut report = DegradationReport::new();
                report.record(DataFeed::Workflow, &e);
                FallbackResult::degraded(WorkflowTopology::new(), report)
            }
        }
    }
}
