//! Work items and their canonical workflow phase.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Canonical workflow phase every status name resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    /// Not yet picked up (backlog, to do, triage).
    NotStarted,
    /// Actively being worked on.
    InProgress,
    /// Finished, including cancelled work.
    Done,
}

impl Phase {
    /// Map a tracker's status category onto a phase.
    ///
    /// Accepts Jira category keys (`new`, `indeterminate`, `done`) and
    /// Linear state types (`backlog`, `unstarted`, `started`, `completed`,
    /// `canceled`). Anything else is `NotStarted`.
    pub fn from_category(category: &str) -> Self {
        match category.trim().to_ascii_lowercase().as_str() {
            "indeterminate" | "in_progress" | "in progress" | "started" => Self::InProgress,
            "done" | "completed" | "canceled" | "cancelled" | "closed" => Self::Done,
            _ => Self::NotStarted,
        }
    }

    /// Whether work in this phase still counts as open.
    pub fn is_open(&self) -> bool {
        !matches!(self, Self::Done)
    }
}

impl Default for Phase {
    fn default() -> Self {
        Self::NotStarted
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "NOT_STARTED"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Item priority, ordered from most to least urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Highest,
    High,
    Medium,
    Low,
    Lowest,
}

impl Priority {
    /// Parse a priority name or a Linear-style number (1 = urgent .. 4 = low).
    ///
    /// Unknown values fall back to `Medium`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "highest" | "blocker" | "urgent" | "critical" | "1" => Self::Highest,
            "high" | "major" | "2" => Self::High,
            "low" | "minor" | "4" => Self::Low,
            "lowest" | "trivial" => Self::Lowest,
            _ => Self::Medium,
        }
    }

    /// `High` or `Highest`.
    pub fn is_high(&self) -> bool {
        matches!(self, Self::Highest | Self::High)
    }

    /// `Low` or `Lowest`.
    pub fn is_low(&self) -> bool {
        matches!(self, Self::Low | Self::Lowest)
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Highest => "Highest",
            Self::High => "High",
            Self::Medium => "Medium",
            Self::Low => "Low",
            Self::Lowest => "Lowest",
        };
        write!(f, "{}", name)
    }
}

/// One entry of an item's status changelog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusTransition {
    /// When the item entered `to_status`
    pub at: DateTime<Utc>,
    /// Status name entered
    pub to_status: String,
}

/// A normalized work item.
///
/// Built once per refresh at the ingestion boundary and never mutated by
/// the engine afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    /// Item key (e.g., "ENG-42")
    pub key: String,
    /// Summary line
    pub title: String,
    /// Current status name as the tracker reports it
    pub status: String,
    /// Item type (Story, Bug, Sub-task, ...)
    pub item_type: String,
    /// Canonical phase of `status`
    pub phase: Phase,
    /// Priority
    pub priority: Priority,
    /// Assignee display name
    pub assignee: Option<String>,
    /// Size estimate in story points
    pub story_points: Option<f64>,
    /// Hours spent in the current status
    pub hours_in_status: f64,
    /// In progress for longer than the stall threshold
    pub is_stalled: bool,
    /// Flagged or parked in a blocked status
    pub is_blocked: bool,
    /// Number of issue links
    pub linked_count: u32,
    /// Whether the item is itself a sub-task
    pub is_subtask: bool,
    /// Number of sub-tasks
    pub subtask_count: u32,
    /// Sub-tasks not yet done
    pub open_subtask_count: u32,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Resolution time
    pub resolved_at: Option<DateTime<Utc>>,
    /// Status changelog, when the source provides one
    pub history: Option<Vec<StatusTransition>>,
    /// Sprints the item belongs to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sprint_ids: Vec<u64>,
}

impl Item {
    /// Create an item with neutral defaults for everything but identity.
    pub fn new(key: impl Into<String>, title: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            status: String::new(),
            item_type: String::new(),
            phase: Phase::NotStarted,
            priority: Priority::Medium,
            assignee: None,
            story_points: None,
            hours_in_status: 0.0,
            is_stalled: false,
            is_blocked: false,
            linked_count: 0,
            is_subtask: false,
            subtask_count: 0,
            open_subtask_count: 0,
            created_at,
            resolved_at: None,
            history: None,
            sprint_ids: Vec::new(),
        }
    }

    /// Whole and fractional days in the current status.
    pub fn days_in_status(&self) -> f64 {
        self.hours_in_status / 24.0
    }

    /// Whether the item has been decomposed into sub-tasks.
    pub fn has_subtasks(&self) -> bool {
        self.subtask_count > 0
    }

    /// Whether any sub-task is still open.
    pub fn has_active_subtasks(&self) -> bool {
        self.open_subtask_count > 0
    }

    pub fn is_assigned(&self) -> bool {
        self.assignee.is_some()
    }

    pub fn is_done(&self) -> bool {
        self.phase == Phase::Done
    }

    pub fn in_sprint(&self, sprint_id: u64) -> bool {
        self.sprint_ids.contains(&sprint_id)
    }
}
