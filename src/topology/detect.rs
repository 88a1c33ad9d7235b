//! Board model detection.

use chrono::{DateTime, Utc};

use crate::core::{DataFeed, DegradationReport, FallbackResult, RetryConfig};
use crate::model::{BoardContext, BoardModel, ProjectKind, Sprint, SprintState};
use crate::source::{fetch_with_retry, parse_timestamp, RawBoard, RawSprint, TrackerSource};

/// Derives a [`BoardContext`] from project and board metadata.
///
/// Detection never fails: every upstream error collapses to the
/// unstructured model and is recorded in the returned degradations.
pub struct BoardDetector<'a> {
    source: &'a dyn TrackerSource,
    retry: RetryConfig,
}

impl<'a> BoardDetector<'a> {
    pub fn new(source: &'a dyn TrackerSource) -> Self {
        Self { source, retry: RetryConfig::fetch() }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Detect the board context of a project.
    pub async fn detect_board_context(
        &self,
        project_key: &str,
        now: DateTime<Utc>,
    ) -> FallbackResult<BoardContext> {
        let mut report = DegradationReport::new();

        let project =
            match fetch_with_retry(&self.retry, "project", || self.source.project(project_key))
                .await
            {
                Ok(project) => project,
                Err(e) => {
                    report.record(DataFeed::Project, &e);
                    return FallbackResult::degraded(
                        BoardContext::unstructured(ProjectKind::Business),
                        report,
                    );
                }
            };

        if project.kind == ProjectKind::Business {
            tracing::debug!(project = project_key, "Business project, no board lookup");
            return FallbackResult::primary(BoardContext::unstructured(ProjectKind::Business));
        }

        let boards =
            match fetch_with_retry(&self.retry, "boards", || self.source.boards(project_key)).await
            {
                Ok(boards) => boards,
                Err(e) => {
                    report.record(DataFeed::Boards, &e);
                    return FallbackResult::degraded(
                        BoardContext::unstructured(ProjectKind::Software),
                        report,
                    );
                }
            };

        let Some(board) = select_board(&boards, project_key) else {
            tracing::debug!(project = project_key, "No boards found");
            return FallbackResult::primary(BoardContext::unstructured(ProjectKind::Software));
        };

        let mut context = BoardContext::unstructured(ProjectKind::Software);
        context.model = BoardModel::parse(&board.board_type);
        context.board_id = Some(board.id);
        context.board_name = Some(board.name.clone());

        if context.model.is_sprint_based() {
            match fetch_with_retry(&self.retry, "sprints", || self.source.sprints(board.id)).await {
                Ok(sprints) => {
                    if let Some(sprint) = select_sprint(&sprints) {
                        context = context.with_sprint(sprint, now);
                    }
                }
                Err(e) => {
                    report.record(DataFeed::Sprints, &e);
                    return FallbackResult::degraded(
                        BoardContext::unstructured(ProjectKind::Software),
                        report,
                    );
                }
            }
        }

        // A missing column configuration only loses the board's own limit.
        match fetch_with_retry(&self.retry, "board configuration", || {
            self.source.board_wip_limit(board.id)
        })
        .await
        {
            Ok(limit) => context.wip_limit = limit,
            Err(e) => report.record(DataFeed::BoardConfiguration, &e),
        }

        tracing::debug!(
            project = project_key,
            board = board.id,
            model = %context.model,
            sprint_active = context.sprint_active,
            "Detected board context"
        );

        FallbackResult::degraded(context, report)
    }
}

/// Prefer the board located in the project itself, else the first listed.
fn select_board<'b>(boards: &'b [RawBoard], project_key: &str) -> Option<&'b RawBoard> {
    boards
        .iter()
        .find(|b| b.project_key.as_deref() == Some(project_key))
        .or_else(|| boards.first())
}

/// The active sprint, else the future sprint starting soonest.
fn select_sprint(sprints: &[RawSprint]) -> Option<Sprint> {
    let convert = |raw: &RawSprint, state: SprintState| Sprint {
        id: raw.id,
        name: raw.name.clone(),
        state,
        start: raw.start_date.as_deref().and_then(parse_timestamp),
        end: raw.end_date.as_deref().and_then(parse_timestamp),
    };

    if let Some(active) = sprints.iter().find(|s| s.state.eq_ignore_ascii_case("active")) {
        return Some(convert(active, SprintState::Active));
    }

    sprints
        .iter()
        .filter(|s| s.state.eq_ignore_ascii_case("future"))
        .map(|s| convert(s, SprintState::Future))
        // Undated future sprints sort after dated ones
        .min_by_key(|s| (s.start.is_none(), s.start, s.id))
}
