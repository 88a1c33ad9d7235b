//! Board model and per-refresh board context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Project classification reported by the tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectKind {
    /// Structured project that may have boards ("software")
    Software,
    /// Unstructured project without boards ("business")
    Business,
}

impl ProjectKind {
    /// Parse a tracker project type key. Only `software` is structured.
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("software") {
            Self::Software
        } else {
            Self::Business
        }
    }
}

/// Process shape governing a board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardModel {
    /// Period-based ("sprint")
    Scrum,
    /// Continuous flow
    Kanban,
    /// No board, or a board we could not classify
    Unknown,
}

impl BoardModel {
    /// Parse a board type. Jira `simple` boards are flow boards.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "scrum" => Self::Scrum,
            "kanban" | "simple" => Self::Kanban,
            _ => Self::Unknown,
        }
    }

    pub fn is_sprint_based(&self) -> bool {
        matches!(self, Self::Scrum)
    }
}

impl fmt::Display for BoardModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scrum => write!(f, "scrum"),
            Self::Kanban => write!(f, "kanban"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// "today", "in 1 day", "in 3 days"
pub fn ending_in(days: i64) -> String {
    match days {
        d if d <= 0 => "today".to_string(),
        1 => "in 1 day".to_string(),
        d => format!("in {} days", d),
    }
}

/// Sprint state relevant to detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SprintState {
    Active,
    Future,
}

/// The sprint a board context is labelled with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sprint {
    pub id: u64,
    pub name: String,
    pub state: SprintState,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl Sprint {
    /// Whole days left until the sprint ends, rounded up and never negative.
    pub fn days_remaining(&self, now: DateTime<Utc>) -> Option<i64> {
        let end = self.end?;
        let seconds = (end - now).num_seconds().max(0);
        Some((seconds + 86_399) / 86_400)
    }
}

/// Board context derived once per refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardContext {
    /// Project classification
    pub project_kind: ProjectKind,
    /// Board model
    pub model: BoardModel,
    /// Selected board id
    pub board_id: Option<u64>,
    /// Selected board name
    pub board_name: Option<String>,
    /// Active sprint, or the nearest future one as a label
    pub sprint: Option<Sprint>,
    /// Whether a sprint is currently running
    pub sprint_active: bool,
    /// Days until the active sprint ends
    pub days_remaining: Option<i64>,
    /// Configured WIP limit
    pub wip_limit: Option<u32>,
    /// Items currently in progress
    pub wip_current: Option<u32>,
}

impl BoardContext {
    /// Context for projects without a usable board.
    pub fn unstructured(project_kind: ProjectKind) -> Self {
        Self {
            project_kind,
            model: BoardModel::Unknown,
            board_id: None,
            board_name: None,
            sprint: None,
            sprint_active: false,
            days_remaining: None,
            wip_limit: None,
            wip_current: None,
        }
    }

    /// Attach a sprint; only an active one counts down.
    pub fn with_sprint(mut self, sprint: Sprint, now: DateTime<Utc>) -> Self {
        self.sprint_active = sprint.state == SprintState::Active;
        self.days_remaining = if self.sprint_active { sprint.days_remaining(now) } else { None };
        self.sprint = Some(sprint);
        self
    }

    /// Record the current WIP count.
    pub fn with_wip_current(mut self, current: u32) -> Self {
        self.wip_current = Some(current);
        self
    }

    /// Active sprint ending within `days` days.
    pub fn sprint_ending_within(&self, days: i64) -> bool {
        self.sprint_active && self.days_remaining.is_some_and(|d| d <= days)
    }

    /// Current WIP strictly above the limit.
    pub fn wip_exceeded(&self) -> bool {
        match (self.wip_current, self.wip_limit) {
            (Some(current), Some(limit)) if limit > 0 => current > limit,
            _ => false,
        }
    }
}

impl Default for BoardContext {
    fn default() -> Self {
        Self::unstructured(ProjectKind::Business)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn sprint(state: SprintState, end_in_hours: i64, now: DateTime<Utc>) -> Sprint {
        Sprint {
            id: 1,
            name: "Sprint 1".to_string(),
            state,
            start: Some(now - Duration::days(7)),
            end: Some(now + Duration::hours(end_in_hours)),
        }
    }

    #[test]
    fn test_board_model_parse() {
        assert_eq!(BoardModel::parse("scrum"), BoardModel::Scrum);
        assert_eq!(BoardModel::parse("Kanban"), BoardModel::Kanban);
        assert_eq!(BoardModel::parse("simple"), BoardModel::Kanban);
        assert_eq!(BoardModel::parse("team-managed"), BoardModel::Unknown);
    }

    #[test]
    fn test_project_kind_parse() {
        assert_eq!(ProjectKind::parse("software"), ProjectKind::Software);
        assert_eq!(ProjectKind::parse("business"), ProjectKind::Business);
        assert_eq!(ProjectKind::parse("service_desk"), ProjectKind::Business);
    }

    #[test]
    fn test_days_remaining_rounds_up() {
        let now = Utc::now();
        assert_eq!(sprint(SprintState::Active, 25, now).days_remaining(now), Some(2));
        assert_eq!(sprint(SprintState::Active, 48, now).days_remaining(now), Some(2));
        assert_eq!(sprint(SprintState::Active, -5, now).days_remaining(now), Some(0));
    }

    #[test]
    fn test_future_sprint_is_label_only() {
        let now = Utc::now();
        let context = BoardContext::unstructured(ProjectKind::Software)
            .with_sprint(sprint(SprintState::Future, 300, now), now);
        assert!(!context.sprint_active);
        assert!(context.days_remaining.is_none());
        assert!(context.sprint.is_some());
        assert!(!context.sprint_ending_within(3));
    }

    #[test]
    fn test_ending_in() {
        assert_eq!(ending_in(0), "today");
        assert_eq!(ending_in(-2), "today");
        assert_eq!(ending_in(1), "in 1 day");
        assert_eq!(ending_in(3), "in 3 days");
    }

    #[test]
    fn test_wip_exceeded() {
        let mut context = BoardContext::default().with_wip_current(12);
        assert!(!context.wip_exceeded());
        context.wip_limit = Some(10);
        assert!(context.wip_exceeded());
        context.wip_limit = Some(0);
        assert!(!context.wip_exceeded());
    }
}
