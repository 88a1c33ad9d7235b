//! Offline snapshot source.
//!
//! Serves a project captured as one JSON document. Missing sections behave
//! like an upstream that cannot serve that feed.

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    parse_timestamp, ProjectInfo, RawBoard, RawIssue, RawSprint, SourceError, SourceResult,
    TrackerSource, WorkflowSchema,
};

/// A captured project.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Snapshot {
    /// When the snapshot was taken (RFC 3339)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<String>,

    /// Project metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectInfo>,

    /// Boards
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boards: Option<Vec<RawBoard>>,

    /// Sprints keyed by board ID
    #[serde(default)]
    pub sprints: HashMap<String, Vec<RawSprint>>,

    /// WIP limits keyed by board ID
    #[serde(default)]
    pub wip_limits: HashMap<String, u32>,

    /// Workflow schema
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<WorkflowSchema>,

    /// Items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issues: Option<Vec<RawIssue>>,
}

/// Tracker source backed by a [`Snapshot`].
#[derive(Debug, Clone)]
pub struct SnapshotSource {
    snapshot: Snapshot,
}

impl SnapshotSource {
    /// Create a source from an in-memory snapshot.
    pub fn new(snapshot: Snapshot) -> Self {
        Self { snapshot }
    }

    /// Parse a snapshot from JSON text.
    pub fn from_json(content: &str) -> SourceResult<Self> {
        Ok(Self::new(serde_json::from_str(content)?))
    }

    /// Load a snapshot file.
    pub fn load(path: &Path) -> SourceResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            SourceError::NotConfigured(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Capture time recorded in the snapshot.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.snapshot.captured_at.as_deref().and_then(parse_timestamp)
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    fn check_project(&self, project_key: &str) -> SourceResult<()> {
        match &self.snapshot.project {
            Some(project) if !project.key.eq_ignore_ascii_case(project_key) => {
                Err(SourceError::NotFound(format!("project {}", project_key)))
            }
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl TrackerSource for SnapshotSource {
    fn name(&self) -> &str {
        "snapshot"
    }

    async fn project(&self, project_key: &str) -> SourceResult<ProjectInfo> {
        self.check_project(project_key)?;
        self.snapshot
            .project
            .clone()
            .ok_or_else(|| SourceError::NotFound(format!("project {}", project_key)))
    }

    async fn boards(&self, project_key: &str) -> SourceResult<Vec<RawBoard>> {
        self.check_project(project_key)?;
        self.snapshot
            .boards
            .clone()
            .ok_or_else(|| SourceError::Unavailable("snapshot has no boards section".to_string()))
    }

    async fn sprints(&self, board_id: u64) -> SourceResult<Vec<RawSprint>> {
        Ok(self.snapshot.sprints.get(&board_id.to_string()).cloned().unwrap_or_default())
    }

    async fn board_wip_limit(&self, board_id: u64) -> SourceResult<Option<u32>> {
        Ok(self.snapshot.wip_limits.get(&board_id.to_string()).copied())
    }

    async fn workflow_schema(&self, project_key: &str) -> SourceResult<WorkflowSchema> {
        self.check_project(project_key)?;
        self.snapshot
            .workflow
            .clone()
            .ok_or_else(|| SourceError::NotFound(format!("workflow of {}", project_key)))
    }

    async fn issues(&self, project_key: &str) -> SourceResult<Vec<RawIssue>> {
        self.check_project(project_key)?;
        self.snapshot
            .issues
            .clone()
            .ok_or_else(|| SourceError::Unavailable("snapshot has no issues section".to_string()))
    }
}
