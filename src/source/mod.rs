//! Issue tracker data sources.
//!
//! The engine only ever talks to a [`TrackerSource`]. Records come back in
//! a loose, tracker-shaped form and are normalized by [`crate::ingest`] and
//! [`crate::topology`] before anything else sees them.

#[cfg(feature = "jira")]
pub mod jira;
pub mod snapshot;

#[cfg(feature = "jira")]
pub use jira::JiraSource;
pub use snapshot::{Snapshot, SnapshotSource};

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{retry_async, AttemptTimedOut, RetryConfig};
use crate::model::ProjectKind;

/// Inbound data contract with the issue tracker.
#[async_trait]
pub trait TrackerSource: Send + Sync {
    /// Get the source name.
    fn name(&self) -> &str;

    /// Project metadata and classification.
    async fn project(&self, project_key: &str) -> SourceResult<ProjectInfo>;

    /// Boards that show the project's items.
    async fn boards(&self, project_key: &str) -> SourceResult<Vec<RawBoard>>;

    /// Active and future sprints of a board.
    async fn sprints(&self, board_id: u64) -> SourceResult<Vec<RawSprint>>;

    /// WIP limit configured on a board, if any.
    async fn board_wip_limit(&self, board_id: u64) -> SourceResult<Option<u32>>;

    /// Workflow status schema of the project.
    async fn workflow_schema(&self, project_key: &str) -> SourceResult<WorkflowSchema>;

    /// Snapshot of the project's items.
    async fn issues(&self, project_key: &str) -> SourceResult<Vec<RawIssue>>;
}

/// Result type for source operations.
pub type SourceResult<T> = Result<T, SourceError>;

/// Error types for source operations.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Tracker API error: {message} (status: {status})")]
    Api { status: u16, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Authentication required")]
    Unauthorized,

    #[error("Rate limit exceeded")]
    RateLimited,

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Source not configured: {0}")]
    NotConfigured(String),
}

impl SourceError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited | Self::Unavailable(_) | Self::Timeout(_) => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

impl From<AttemptTimedOut> for SourceError {
    fn from(timeout: AttemptTimedOut) -> Self {
        Self::Timeout(timeout.0)
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(error: serde_json::Error) -> Self {
        Self::Parse(error.to_string())
    }
}

/// Project metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    /// Project key (e.g., "ENG")
    pub key: String,
    /// Display name
    #[serde(default)]
    pub name: String,
    /// Structured or unstructured
    pub kind: ProjectKind,
}

/// A board as the tracker lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBoard {
    /// Board ID
    pub id: u64,
    /// Board name
    #[serde(default)]
    pub name: String,
    /// Board type (scrum, kanban, simple)
    #[serde(rename = "type", default)]
    pub board_type: String,
    /// Key of the project the board is located in
    #[serde(default)]
    pub project_key: Option<String>,
}

/// A sprint as the tracker lists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSprint {
    /// Sprint ID
    pub id: u64,
    /// Sprint name
    #[serde(default)]
    pub name: String,
    /// Sprint state (active, future, closed)
    #[serde(default)]
    pub state: String,
    /// Start date
    #[serde(default, alias = "startDate")]
    pub start_date: Option<String>,
    /// End date
    #[serde(default, alias = "endDate")]
    pub end_date: Option<String>,
}

/// One status in a workflow schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaStatus {
    /// Status name
    pub name: String,
    /// Status category (Jira category key or Linear state type)
    pub category: String,
}

impl SchemaStatus {
    pub fn new(name: impl Into<String>, category: impl Into<String>) -> Self {
        Self { name: name.into(), category: category.into() }
    }
}

/// Statuses specific to one item type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTypeStatuses {
    /// Item type name
    pub item_type: String,
    /// Statuses available to that type
    pub statuses: Vec<SchemaStatus>,
}

/// Workflow status schema of a project.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowSchema {
    /// Statuses shared by all item types
    #[serde(default)]
    pub statuses: Vec<SchemaStatus>,
    /// Per item type statuses
    #[serde(default)]
    pub by_item_type: Vec<ItemTypeStatuses>,
}

/// An item record exactly as the tracker returned it.
///
/// Field layout differs between trackers and with how complete the record
/// is, so it stays untyped until ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawIssue(pub serde_json::Value);

impl RawIssue {
    /// Look a value up by the first of several dotted paths that resolves.
    pub fn lookup(&self, paths: &[&str]) -> Option<&serde_json::Value> {
        paths.iter().find_map(|path| {
            let value = path.split('.').try_fold(&self.0, |value, key| value.get(key))?;
            (!value.is_null()).then_some(value)
        })
    }

    /// First string found among `paths`.
    pub fn lookup_str(&self, paths: &[&str]) -> Option<&str> {
        paths.iter().find_map(|path| self.lookup(&[*path]).and_then(|v| v.as_str()))
    }
}

/// Run one source call under the retry policy, retrying transient errors.
pub async fn fetch_with_retry<T, F, Fut>(
    retry: &RetryConfig,
    what: &str,
    operation: F,
) -> SourceResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SourceResult<T>>,
{
    let outcome = retry_async(retry, operation, SourceError::is_transient).await;
    if outcome.was_retried() {
        tracing::debug!(
            what,
            attempts = outcome.attempts,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            ok = outcome.is_ok(),
            "Fetch retried"
        );
    }
    outcome.into_result()
}

/// Parse a tracker timestamp.
///
/// Accepts RFC 3339, Jira's `+0000` offsets with optional fractional
/// seconds, and bare `YYYY-MM-DD` dates (midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
