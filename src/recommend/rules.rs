//! Per-action applicability rules.
//!
//! Each action has its own hand-written rule. Rules share nothing but the
//! relevance vocabulary, and attach a reason only at the `Critical` and
//! `Recommended` tiers (plus a few explanatory `Available` cases).

use std::collections::HashMap;

use serde::Serialize;

use super::catalog::{ActionId, Relevance};
use crate::core::EngineConfig;
use crate::model::{ending_in, BoardContext, BoardModel, Item, Phase, Priority};

/// Outcome of evaluating one action against one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub relevance: Relevance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Evaluation {
    pub fn critical(reason: impl Into<String>) -> Self {
        Self { relevance: Relevance::Critical, reason: Some(reason.into()) }
    }

    pub fn recommended(reason: impl Into<String>) -> Self {
        Self { relevance: Relevance::Recommended, reason: Some(reason.into()) }
    }

    pub fn available() -> Self {
        Self { relevance: Relevance::Available, reason: None }
    }

    pub fn available_because(reason: impl Into<String>) -> Self {
        Self { relevance: Relevance::Available, reason: Some(reason.into()) }
    }

    pub fn hidden() -> Self {
        Self { relevance: Relevance::Hidden, reason: None }
    }

    pub fn is_visible(&self) -> bool {
        self.relevance != Relevance::Hidden
    }
}

/// A pure applicability function.
pub type Rule = fn(&Item, &BoardContext, &EngineConfig) -> Evaluation;

/// Maps action ids to their rules.
#[derive(Clone)]
pub struct RuleRegistry {
    rules: HashMap<ActionId, Rule>,
}

impl std::fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RuleRegistry").field("rules", &self.rules.len()).finish()
    }
}

impl RuleRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { rules: HashMap::new() }
    }

    /// The built-in rule for every catalog action.
    pub fn standard() -> Self {
        Self::new()
            .with_rule(ActionId::SplitTicket, split_ticket)
            .with_rule(ActionId::Reassign, reassign)
            .with_rule(ActionId::MoveToBacklog, move_to_backlog)
            .with_rule(ActionId::EscalatePriority, escalate_priority)
            .with_rule(ActionId::FlagBlocked, flag_blocked)
            .with_rule(ActionId::TransitionForward, transition_forward)
            .with_rule(ActionId::LinkRelated, link_related)
            .with_rule(ActionId::Reestimate, reestimate)
            .with_rule(ActionId::BroadcastNote, broadcast_note)
            .with_rule(ActionId::CreateSubtask, create_subtask)
    }

    /// Register a rule, replacing any existing one for the action.
    pub fn register(&mut self, id: ActionId, rule: Rule) {
        self.rules.insert(id, rule);
    }

    pub fn with_rule(mut self, id: ActionId, rule: Rule) -> Self {
        self.register(id, rule);
        self
    }

    pub fn get(&self, id: ActionId) -> Option<Rule> {
        self.rules.get(&id).copied()
    }

    /// Evaluate an action. Actions without a rule are hidden.
    pub fn evaluate(
        &self,
        id: ActionId,
        item: &Item,
        board: &BoardContext,
        config: &EngineConfig,
    ) -> Evaluation {
        match self.rules.get(&id) {
            Some(rule) => rule(item, board, config),
            None => Evaluation::hidden(),
        }
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

fn whole_days(item: &Item) -> i64 {
    item.days_in_status().floor() as i64
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {}", unit)
    } else {
        format!("{} {}s", n, unit)
    }
}

fn points_at_least(item: &Item, threshold: f64) -> bool {
    item.story_points.is_some_and(|p| p >= threshold)
}

fn split_ticket(item: &Item, _board: &BoardContext, config: &EngineConfig) -> Evaluation {
    if item.is_subtask || item.is_done() {
        return Evaluation::hidden();
    }

    let days = item.days_in_status();
    let decomposed = item.has_subtasks();

    if item.is_stalled && !decomposed {
        if let Some(points) = item.story_points.filter(|p| *p >= config.split_points_threshold) {
            return Evaluation::critical(format!(
                "Large stalled ticket ({} pts) with no sub-tasks. Split it to keep work moving.",
                points
            ));
        }
        if days > 5.0 && item.priority != Priority::Lowest {
            return Evaluation::critical(format!(
                "Stuck {} in {}. Break it down to unblock progress.",
                plural(whole_days(item), "day"),
                item.status
            ));
        }
    }

    if (item.is_stalled || days > 3.0) && !decomposed {
        return Evaluation::recommended(format!(
            "No movement for {}. Smaller pieces are easier to finish.",
            plural(whole_days(item), "day")
        ));
    }

    if decomposed {
        Evaluation::hidden()
    } else {
        Evaluation::available()
    }
}

fn reassign(item: &Item, _board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() {
        return Evaluation::hidden();
    }

    let Some(assignee) = item.assignee.as_deref() else {
        return Evaluation::available_because("No one owns this ticket yet.");
    };

    if item.is_stalled && item.priority.is_high() {
        return Evaluation::critical(format!(
            "{} ticket stalled with {}. Hand it to someone with capacity.",
            item.priority, assignee
        ));
    }
    if item.is_stalled {
        return Evaluation::recommended(format!(
            "Stalled with {} for {}.",
            assignee,
            plural(whole_days(item), "day")
        ));
    }
    if item.priority.is_high() && item.days_in_status() > 2.0 {
        return Evaluation::recommended(format!(
            "{} ticket idle for {}.",
            item.priority,
            plural(whole_days(item), "day")
        ));
    }

    Evaluation::available()
}

/// Only `Highest` is protected from deferral near the sprint end; the
/// low-priority and WIP tiers skip anything high.
fn move_to_backlog(item: &Item, board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_subtask || item.is_done() || item.priority == Priority::Highest {
        return Evaluation::hidden();
    }

    if board.sprint_ending_within(3) {
        let remaining = board.days_remaining.unwrap_or(0);
        return Evaluation::critical(format!(
            "Sprint ending {}. Defer it to protect the sprint goal.",
            ending_in(remaining)
        ));
    }

    if item.days_in_status() > 10.0 && item.priority.is_low() {
        return Evaluation::critical(format!(
            "Stuck {} at {} priority. Move it out of the way.",
            plural(whole_days(item), "day"),
            item.priority
        ));
    }

    if board.model == BoardModel::Kanban && board.wip_exceeded() && !item.priority.is_high() {
        return Evaluation::recommended(format!(
            "WIP over limit ({}/{}). Free a slot by deferring lower-priority work.",
            board.wip_current.unwrap_or(0),
            board.wip_limit.unwrap_or(0)
        ));
    }

    if item.priority.is_high() {
        Evaluation::hidden()
    } else {
        Evaluation::available()
    }
}

fn escalate_priority(item: &Item, board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() || item.priority == Priority::Highest {
        return Evaluation::hidden();
    }

    let high = item.priority.is_high();

    if item.is_blocked && item.days_in_status() > 3.0 && !high {
        return Evaluation::critical(format!(
            "Blocked for {} at {} priority.",
            plural(whole_days(item), "day"),
            item.priority
        ));
    }
    if item.is_stalled && item.linked_count > 0 && !high {
        return Evaluation::recommended(format!(
            "Stalled with {} depending on it.",
            plural(i64::from(item.linked_count), "linked item")
        ));
    }
    if board.sprint_ending_within(3)
        && item.priority == Priority::Medium
        && item.phase == Phase::InProgress
    {
        return Evaluation::recommended(format!(
            "Sprint ending {}. Raise it to land in time.",
            ending_in(board.days_remaining.unwrap_or(0))
        ));
    }

    Evaluation::available()
}

fn flag_blocked(item: &Item, _board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() || item.is_blocked {
        return Evaluation::hidden();
    }

    if item.is_stalled && item.days_in_status() > 5.0 && item.linked_count > 0 {
        return Evaluation::critical(format!(
            "Stalled {} with {}. Likely blocked.",
            plural(whole_days(item), "day"),
            plural(i64::from(item.linked_count), "linked item")
        ));
    }
    if item.is_stalled {
        return Evaluation::recommended(format!(
            "Stalled in {}. Flag it if something is in the way.",
            item.status
        ));
    }

    Evaluation::available()
}

fn transition_forward(item: &Item, board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() {
        return Evaluation::hidden();
    }
    if item.is_blocked {
        return Evaluation::available();
    }

    if item.phase == Phase::InProgress && item.has_subtasks() && !item.has_active_subtasks() {
        return Evaluation::critical(format!(
            "All {} are done. Move the ticket forward.",
            plural(i64::from(item.subtask_count), "sub-task")
        ));
    }
    if item.phase == Phase::NotStarted && item.is_assigned() && board.sprint_active {
        return Evaluation::recommended("Assigned in an active sprint but not started.");
    }

    Evaluation::available()
}

fn link_related(item: &Item, _board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() {
        return Evaluation::hidden();
    }

    if item.is_blocked && item.linked_count == 0 {
        if item.days_in_status() > 5.0 {
            return Evaluation::critical(format!(
                "Blocked {} with no linked blocker.",
                plural(whole_days(item), "day")
            ));
        }
        return Evaluation::recommended("Blocked with no linked blocker.");
    }

    Evaluation::available()
}

fn reestimate(item: &Item, board: &BoardContext, config: &EngineConfig) -> Evaluation {
    if item.is_done() {
        return Evaluation::hidden();
    }

    let Some(points) = item.story_points else {
        if item.phase != Phase::NotStarted {
            return Evaluation::recommended("No estimate on work already in progress.");
        }
        return Evaluation::available();
    };

    if board.model == BoardModel::Kanban && points_at_least(item, config.flow_large_points_threshold)
    {
        return Evaluation::recommended(format!(
            "{} pts is large for a flow board. Re-size or split it.",
            points
        ));
    }
    if item.is_stalled && points <= 2.0 && item.days_in_status() > 5.0 {
        return Evaluation::recommended(format!(
            "Estimated at {} pts but stalled {}.",
            points,
            plural(whole_days(item), "day")
        ));
    }

    Evaluation::available()
}

fn broadcast_note(item: &Item, board: &BoardContext, _config: &EngineConfig) -> Evaluation {
    if item.is_done() {
        return Evaluation::hidden();
    }

    if item.is_blocked && item.priority.is_high() && item.days_in_status() > 2.0 {
        return Evaluation::critical(format!(
            "{} ticket blocked for {}. Let stakeholders know.",
            item.priority,
            plural(whole_days(item), "day")
        ));
    }
    if item.is_stalled && board.sprint_ending_within(3) {
        return Evaluation::recommended(format!(
            "Stalled with the sprint ending {}.",
            ending_in(board.days_remaining.unwrap_or(0))
        ));
    }
    if item.is_blocked {
        return Evaluation::recommended(format!("Blocked in {}.", item.status));
    }

    Evaluation::available()
}

fn create_subtask(item: &Item, _board: &BoardContext, config: &EngineConfig) -> Evaluation {
    if item.is_subtask || item.is_done() {
        return Evaluation::hidden();
    }

    if item.phase == Phase::InProgress
        && !item.has_subtasks()
        && !item.is_stalled
        && points_at_least(item, config.split_points_threshold)
    {
        return Evaluation::recommended(format!(
            "{} pts in progress with no sub-tasks to track it.",
            item.story_points.unwrap_or_default()
        ));
    }

    Evaluation::available()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::model::ProjectKind;

    fn item(days: f64) -> Item {
        let mut item = Item::new("ENG-1", "Checkout", Utc::now());
        item.status = "In Progress".to_string();
        item.phase = Phase::InProgress;
        item.hours_in_status = days * 24.0;
        item.assignee = Some("Dana".to_string());
        item
    }

    fn scrum(days_remaining: Option<i64>) -> BoardContext {
        let mut board = BoardContext::unstructured(ProjectKind::Software);
        board.model = BoardModel::Scrum;
        board.sprint_active = days_remaining.is_some();
        board.days_remaining = days_remaining;
        board
    }

    fn kanban(current: u32, limit: u32) -> BoardContext {
        let mut board = BoardContext::unstructured(ProjectKind::Software);
        board.model = BoardModel::Kanban;
        board.wip_limit = Some(limit);
        board.wip_current = Some(current);
        board
    }

    #[test]
    fn test_split_large_stalled_ticket() {
        let mut it = item(6.0);
        it.is_stalled = true;
        it.story_points = Some(8.0);
        it.priority = Priority::High;

        let eval = split_ticket(&it, &scrum(Some(2)), &EngineConfig::default());
        assert_eq!(eval.relevance, Relevance::Critical);
        assert!(eval.reason.unwrap().starts_with("Large stalled ticket (8 pts)"));
    }

    #[test]
    fn test_split_stuck_ticket_unless_lowest() {
        let mut it = item(6.0);
        it.is_stalled = true;
        let eval = split_ticket(&it, &scrum(None), &EngineConfig::default());
        assert_eq!(eval.relevance, Relevance::Critical);
        assert!(eval.reason.unwrap().contains("Stuck 6 days"));

        it.priority = Priority::Lowest;
        let eval = split_ticket(&it, &scrum(None), &EngineConfig::default());
        assert_eq!(eval.relevance, Relevance::Recommended);
    }

    #[test]
    fn test_split_hidden_for_subtasks_and_decomposed() {
        let mut it = item(1.0);
        it.is_subtask = true;
        assert_eq!(split_ticket(&it, &scrum(None), &EngineConfig::default()), Evaluation::hidden());

        let mut it = item(1.0);
        it.subtask_count = 3;
        assert_eq!(split_ticket(&it, &scrum(None), &EngineConfig::default()), Evaluation::hidden());

        let it = item(1.0);
        assert_eq!(split_ticket(&it, &scrum(None), &EngineConfig::default()), Evaluation::available());
    }

    #[test]
    fn test_split_hidden_for_decomposed_stuck_ticket() {
        let mut it = item(9.0);
        it.is_stalled = true;
        it.story_points = Some(8.0);
        it.subtask_count = 2;
        assert_eq!(split_ticket(&it, &scrum(Some(2)), &EngineConfig::default()), Evaluation::hidden());
    }

    #[test]
    fn test_split_threshold_is_configurable() {
        let mut it = item(1.5);
        it.is_stalled = true;
        it.story_points = Some(3.0);
        let config = EngineConfig::default();
        assert_eq!(split_ticket(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        let config = EngineConfig { split_points_threshold: 3.0, ..Default::default() };
        assert_eq!(split_ticket(&it, &scrum(None), &config).relevance, Relevance::Critical);
    }

    #[test]
    fn test_reassign_tiers() {
        let config = EngineConfig::default();
        let mut it = item(3.0);
        it.is_stalled = true;
        it.priority = Priority::Highest;
        assert_eq!(reassign(&it, &scrum(None), &config).relevance, Relevance::Critical);

        it.priority = Priority::Medium;
        assert_eq!(reassign(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        it.is_stalled = false;
        it.priority = Priority::High;
        assert_eq!(reassign(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        it.assignee = None;
        let eval = reassign(&it, &scrum(None), &config);
        assert_eq!(eval.relevance, Relevance::Available);
        assert!(eval.reason.is_some());
    }

    #[test]
    fn test_defer_near_sprint_end() {
        let config = EngineConfig::default();
        let mut it = item(6.0);
        it.priority = Priority::High;

        let eval = move_to_backlog(&it, &scrum(Some(2)), &config);
        assert_eq!(eval.relevance, Relevance::Critical);
        assert_eq!(
            eval.reason.as_deref(),
            Some("Sprint ending in 2 days. Defer it to protect the sprint goal.")
        );

        assert_eq!(move_to_backlog(&it, &scrum(Some(4)), &config), Evaluation::hidden());

        it.priority = Priority::Highest;
        assert_eq!(move_to_backlog(&it, &scrum(Some(2)), &config), Evaluation::hidden());
    }

    #[test]
    fn test_defer_long_idle_low_priority() {
        let mut it = item(11.0);
        it.priority = Priority::Low;
        let eval = move_to_backlog(&it, &scrum(None), &EngineConfig::default());
        assert_eq!(eval.relevance, Relevance::Critical);
        assert!(eval.reason.unwrap().contains("Stuck 11 days at Low priority"));
    }

    #[test]
    fn test_defer_over_wip_on_flow_board() {
        let config = EngineConfig::default();
        let it = item(1.0);
        let eval = move_to_backlog(&it, &kanban(12, 10), &config);
        assert_eq!(eval.relevance, Relevance::Recommended);
        assert!(eval.reason.unwrap().contains("(12/10)"));

        assert_eq!(move_to_backlog(&it, &kanban(9, 10), &config).relevance, Relevance::Available);
    }

    #[test]
    fn test_escalate_blocked_ticket() {
        let config = EngineConfig::default();
        let mut it = item(4.0);
        it.is_blocked = true;
        assert_eq!(escalate_priority(&it, &scrum(None), &config).relevance, Relevance::Critical);

        it.priority = Priority::High;
        assert_eq!(escalate_priority(&it, &scrum(None), &config).relevance, Relevance::Available);

        it.priority = Priority::Highest;
        assert_eq!(escalate_priority(&it, &scrum(None), &config), Evaluation::hidden());
    }

    #[test]
    fn test_flag_blocked_tiers() {
        let config = EngineConfig::default();
        let mut it = item(6.0);
        it.is_stalled = true;
        it.linked_count = 2;
        assert_eq!(flag_blocked(&it, &scrum(None), &config).relevance, Relevance::Critical);

        it.linked_count = 0;
        assert_eq!(flag_blocked(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        it.is_blocked = true;
        assert_eq!(flag_blocked(&it, &scrum(None), &config), Evaluation::hidden());
    }

    #[test]
    fn test_transition_when_subtasks_done() {
        let config = EngineConfig::default();
        let mut it = item(1.0);
        it.subtask_count = 2;
        let eval = transition_forward(&it, &scrum(None), &config);
        assert_eq!(eval.relevance, Relevance::Critical);
        assert_eq!(eval.reason.as_deref(), Some("All 2 sub-tasks are done. Move the ticket forward."));

        it.open_subtask_count = 1;
        assert_eq!(transition_forward(&it, &scrum(None), &config).relevance, Relevance::Available);
    }

    #[test]
    fn test_link_related_for_unlinked_blockers() {
        let config = EngineConfig::default();
        let mut it = item(2.0);
        it.is_blocked = true;
        assert_eq!(link_related(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        it.hours_in_status = 7.0 * 24.0;
        assert_eq!(link_related(&it, &scrum(None), &config).relevance, Relevance::Critical);

        it.linked_count = 1;
        assert_eq!(link_related(&it, &scrum(None), &config).relevance, Relevance::Available);
    }

    #[test]
    fn test_reestimate_uses_flow_threshold() {
        let config = EngineConfig::default();
        let mut it = item(1.0);
        it.story_points = Some(8.0);
        assert_eq!(reestimate(&it, &kanban(1, 10), &config).relevance, Relevance::Recommended);
        assert_eq!(reestimate(&it, &scrum(None), &config).relevance, Relevance::Available);

        it.story_points = Some(5.0);
        assert_eq!(reestimate(&it, &kanban(1, 10), &config).relevance, Relevance::Available);

        it.story_points = None;
        assert_eq!(reestimate(&it, &scrum(None), &config).relevance, Relevance::Recommended);
    }

    #[test]
    fn test_broadcast_note_tiers() {
        let config = EngineConfig::default();
        let mut it = item(3.0);
        it.is_blocked = true;
        it.priority = Priority::High;
        assert_eq!(broadcast_note(&it, &scrum(None), &config).relevance, Relevance::Critical);

        it.priority = Priority::Medium;
        assert_eq!(broadcast_note(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        let mut it = item(3.0);
        it.is_stalled = true;
        let eval = broadcast_note(&it, &scrum(Some(0)), &config);
        assert_eq!(eval.reason.as_deref(), Some("Stalled with the sprint ending today."));
    }

    #[test]
    fn test_create_subtask_for_large_active_work() {
        let config = EngineConfig::default();
        let mut it = item(0.5);
        it.story_points = Some(5.0);
        assert_eq!(create_subtask(&it, &scrum(None), &config).relevance, Relevance::Recommended);

        it.is_stalled = true;
        assert_eq!(create_subtask(&it, &scrum(None), &config).relevance, Relevance::Available);

        it.is_subtask = true;
        assert_eq!(create_subtask(&it, &scrum(None), &config), Evaluation::hidden());
    }

    #[test]
    fn test_done_items_hidden_everywhere() {
        let registry = RuleRegistry::standard();
        let config = EngineConfig::default();
        let mut it = item(20.0);
        it.phase = Phase::Done;
        it.is_stalled = true;

        for id in ActionId::ALL {
            assert_eq!(
                registry.evaluate(id, &it, &scrum(Some(1)), &config),
                Evaluation::hidden(),
                "{} should be hidden for done items",
                id
            );
        }
    }

    #[test]
    fn test_registry_override_and_missing_rule() {
        fn always(_: &Item, _: &BoardContext, _: &EngineConfig) -> Evaluation {
            Evaluation::critical("always")
        }

        let registry = RuleRegistry::new().with_rule(ActionId::Reassign, always);
        let it = item(0.0);
        let config = EngineConfig::default();
        assert_eq!(registry.len(), 1);
        assert_eq!(
            registry.evaluate(ActionId::Reassign, &it, &scrum(None), &config).relevance,
            Relevance::Critical
        );
        assert_eq!(
            registry.evaluate(ActionId::SplitTicket, &it, &scrum(None), &config),
            Evaluation::hidden()
        );
        assert_eq!(RuleRegistry::standard().len(), ActionId::ALL.len());
    }
}
