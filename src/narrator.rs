//! Situation narrator.
//!
//! Deterministic text templates: the same input always yields the same
//! sentence, so the output can be snapshot-tested and handed to an
//! assistant verbatim.

use crate::metrics::{format_hours, format_percent, format_signed_percent, MetricSnapshot};
use crate::model::{ending_in, BoardContext, BoardModel, Item};

/// Text used when no risk predicate fires.
pub const NO_RISK: &str = "No risk factors detected.";

/// Composes short descriptions of items and boards.
#[derive(Debug, Clone, Copy)]
pub struct Narrator {
    max_clauses: usize,
}

impl Default for Narrator {
    fn default() -> Self {
        Self { max_clauses: 3 }
    }
}

impl Narrator {
    pub fn new(max_clauses: usize) -> Self {
        Self { max_clauses: max_clauses.max(1) }
    }

    /// Describe an item's risk factors.
    pub fn describe(&self, item: &Item, board: &BoardContext) -> String {
        let days = item.days_in_status().floor() as i64;
        let mut clauses: Vec<String> = Vec::new();

        if board.sprint_ending_within(3) {
            clauses.push(format!("Sprint ends {}.", ending_in(board.days_remaining.unwrap_or(0))));
        }
        if board.wip_exceeded() {
            clauses.push(format!(
                "WIP is over limit ({}/{}).",
                board.wip_current.unwrap_or(0),
                board.wip_limit.unwrap_or(0)
            ));
        }
        if item.is_blocked {
            clauses.push("Ticket is blocked.".to_string());
        }
        if item.is_stalled {
            clauses.push(format!(
                "Ticket is stalled in {} for {}.",
                status_label(item),
                days_label(days)
            ));
        }
        if days > 10 {
            clauses.push(format!("No movement for {}.", days_label(days)));
        }
        if item.story_points.is_none() && !item.is_done() {
            clauses.push("No estimate set.".to_string());
        }
        if item.has_active_subtasks() {
            let open = item.open_subtask_count;
            clauses.push(if open == 1 {
                "1 sub-task still open.".to_string()
            } else {
                format!("{} sub-tasks still open.", open)
            });
        }

        if clauses.is_empty() {
            return NO_RISK.to_string();
        }
        clauses.truncate(self.max_clauses);
        clauses.join(" ")
    }

    /// One-paragraph board overview.
    pub fn summarize(&self, board: &BoardContext, metrics: Option<&MetricSnapshot>) -> String {
        let mut parts = vec![board_label(board)];

        if let Some(sprint) = &board.sprint {
            parts.push(match (board.sprint_active, board.days_remaining) {
                (true, Some(days)) => format!("{} ends {}.", sprint.name, ending_in(days)),
                (true, None) => format!("{} is active.", sprint.name),
                (false, _) => format!("Next sprint: {}.", sprint.name),
            });
        }

        let Some(metrics) = metrics else {
            parts.push("Metrics unavailable.".to_string());
            return parts.join(" ");
        };

        let counts = &metrics.counts;
        parts.push(format!(
            "{} items: {} in progress, {} done, {} stalled, {} blocked.",
            counts.total, counts.in_progress, counts.done, counts.stalled, counts.blocked
        ));

        let wip = match metrics.wip_limit {
            Some(limit) => format!(
                "WIP load {} ({}/{})",
                format_percent(metrics.wip_load),
                metrics.wip_current,
                limit
            ),
            None => format!("WIP load {}", format_percent(None)),
        };
        if board.model.is_sprint_based() && board.sprint_active {
            parts.push(format!(
                "Health {}: pace {}, {}.",
                metrics.health,
                format_signed_percent(metrics.pace_variance),
                wip
            ));
        } else {
            parts.push(format!("Health {}: {}.", metrics.health, wip));
        }

        if let Some(cycle) = &metrics.cycle_time {
            let basis = if cycle.is_proxy() { " (estimated from creation dates)" } else { "" };
            parts.push(format!(
                "Median cycle time {}{}.",
                format_hours(Some(cycle.median_hours)),
                basis
            ));
        }

        parts.join(" ")
    }
}

/// Describe an item with the default clause limit.
pub fn describe(item: &Item, board: &BoardContext) -> String {
    Narrator::default().describe(item, board)
}

fn status_label(item: &Item) -> &str {
    if item.status.is_empty() {
        "its current status"
    } else {
        &item.status
    }
}

fn days_label(days: i64) -> String {
    if days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", days)
    }
}

fn board_label(board: &BoardContext) -> String {
    let name = board.board_name.as_deref().map(|n| format!(" '{}'", n)).unwrap_or_default();
    match board.model {
        BoardModel::Scrum => format!("Scrum board{}.", name),
        BoardModel::Kanban => format!("Kanban board{}.", name),
        BoardModel::Unknown => "No board (unstructured project).".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::model::{Phase, ProjectKind};

    fn item() -> Item {
        let created = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        let mut item = Item::new("ENG-1", "Checkout", created);
        item.status = "In Review".to_string();
        item.phase = Phase::InProgress;
        item.story_points = Some(3.0);
        item
    }

    fn scrum(days_remaining: Option<i64>) -> BoardContext {
        let mut board = BoardContext::unstructured(ProjectKind::Software);
        board.model = BoardModel::Scrum;
        board.sprint_active = days_remaining.is_some();
        board.days_remaining = days_remaining;
        board
    }

    #[test]
    fn test_no_risk() {
        assert_eq!(describe(&item(), &scrum(None)), NO_RISK);
    }

    #[test]
    fn test_clause_order_and_limit() {
        let mut it = item();
        it.is_stalled = true;
        it.hours_in_status = 12.0 * 24.0;
        it.story_points = None;

        let mut board = scrum(Some(2));
        board.wip_limit = Some(10);
        board.wip_current = Some(12);

        insta::assert_snapshot!(
            describe(&it, &board),
            @"Sprint ends in 2 days. WIP is over limit (12/10). Ticket is stalled in In Review for 12 days."
        );
        insta::assert_snapshot!(
            Narrator::new(10).describe(&it, &board),
            @"Sprint ends in 2 days. WIP is over limit (12/10). Ticket is stalled in In Review for 12 days. No movement for 12 days. No estimate set."
        );
    }

    #[test]
    fn test_blocked_with_open_subtasks() {
        let mut it = item();
        it.is_blocked = true;
        it.subtask_count = 3;
        it.open_subtask_count = 1;
        insta::assert_snapshot!(
            describe(&it, &scrum(Some(0))),
            @"Sprint ends today. Ticket is blocked. 1 sub-task still open."
        );
    }

    #[test]
    fn test_describe_is_deterministic() {
        let mut it = item();
        it.is_stalled = true;
        it.hours_in_status = 30.0;
        let board = scrum(Some(1));
        assert_eq!(describe(&it, &board), describe(&it, &board));
        assert_eq!(describe(&it, &board), "Sprint ends in 1 day. Ticket is stalled in In Review for 1 day.");
    }

    #[test]
    fn test_summarize_without_metrics() {
        let narrator = Narrator::default();
        let board = BoardContext::unstructured(ProjectKind::Business);
        assert_eq!(
            narrator.summarize(&board, None),
            "No board (unstructured project). Metrics unavailable."
        );
    }
}
