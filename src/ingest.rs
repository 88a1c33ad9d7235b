//! Ingestion boundary.
//!
//! Tracker records are heterogeneous: the same field may live under
//! several paths depending on the tracker and on how complete the record
//! is. Everything is normalized into [`Item`] here, and the rest of the
//! engine only ever sees that shape.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::core::EngineConfig;
use crate::model::{Item, Phase, Priority, StatusTransition};
use crate::source::{parse_timestamp, RawIssue};
use crate::topology::WorkflowTopology;

const KEY_PATHS: &[&str] = &["key", "identifier", "id"];
const TITLE_PATHS: &[&str] = &["fields.summary", "summary", "title"];
const STATUS_PATHS: &[&str] = &["fields.status.name", "status.name", "status", "statusName"];
const TYPE_PATHS: &[&str] = &["fields.issuetype.name", "issuetype.name", "issueType", "type"];
const PRIORITY_PATHS: &[&str] = &["fields.priority.name", "priority.name", "priority"];
const ASSIGNEE_PATHS: &[&str] = &[
    "fields.assignee.displayName",
    "assignee.displayName",
    "assignee.name",
    "assignee",
];
const POINTS_PATHS: &[&str] = &[
    "fields.customfield_10016",
    "fields.customfield_10026",
    "fields.story_points",
    "storyPoints",
    "estimate",
];
const CREATED_PATHS: &[&str] = &["fields.created", "created", "createdAt"];
const RESOLVED_PATHS: &[&str] =
    &["fields.resolutiondate", "resolutiondate", "resolvedAt", "completedAt"];
const STATUS_CHANGED_PATHS: &[&str] =
    &["fields.statuscategorychangedate", "statusChangedAt", "startedAt"];
const UPDATED_PATHS: &[&str] = &["fields.updated", "updated", "updatedAt"];
const LINK_PATHS: &[&str] = &["fields.issuelinks", "issuelinks", "relations", "linkedCount"];
const SUBTASK_PATHS: &[&str] = &["fields.subtasks", "subtasks", "children"];
const SPRINT_PATHS: &[&str] =
    &["fields.customfield_10020", "fields.sprint", "sprint", "sprints", "sprintId"];

/// Status words that park an item as blocked.
const BLOCKED_WORDS: &[&str] = &["blocked", "block", "impeded", "waiting"];

/// Simplified changelog entry accepted from snapshots.
#[derive(Deserialize)]
struct PlainTransition {
    at: String,
    to_status: String,
}

/// Normalizes raw tracker records into items for one refresh.
pub struct Ingestor<'a> {
    topology: &'a WorkflowTopology,
    config: &'a EngineConfig,
    now: DateTime<Utc>,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        topology: &'a WorkflowTopology,
        config: &'a EngineConfig,
        now: DateTime<Utc>,
    ) -> Self {
        Self { topology, config, now }
    }

    /// Normalize every record, dropping ones without a key.
    pub fn normalize_all(&self, raw: &[RawIssue]) -> Vec<Item> {
        let items: Vec<Item> = raw.iter().filter_map(|r| self.normalize(r)).collect();
        if items.len() < raw.len() {
            tracing::debug!(dropped = raw.len() - items.len(), "Skipped records without a key");
        }
        items
    }

    /// Normalize a single record.
    pub fn normalize(&self, raw: &RawIssue) -> Option<Item> {
        let key = raw.lookup(KEY_PATHS).and_then(scalar_string)?;
        let created_at = raw.lookup_str(CREATED_PATHS).and_then(parse_timestamp).unwrap_or(self.now);

        let mut item = Item::new(key, raw.lookup_str(TITLE_PATHS).unwrap_or_default(), created_at);
        item.status = raw.lookup_str(STATUS_PATHS).unwrap_or_default().trim().to_string();
        item.item_type = raw.lookup_str(TYPE_PATHS).unwrap_or_default().trim().to_string();
        item.phase = self.topology.resolve_phase(&item.status, Some(&item.item_type));
        item.priority = raw
            .lookup(PRIORITY_PATHS)
            .and_then(scalar_string)
            .map(|p| Priority::parse(&p))
            .unwrap_or_default();
        item.assignee = raw
            .lookup_str(ASSIGNEE_PATHS)
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from);
        item.story_points = raw
            .lookup(POINTS_PATHS)
            .and_then(Value::as_f64)
            .filter(|p| p.is_finite() && *p >= 0.0);
        item.resolved_at = raw.lookup_str(RESOLVED_PATHS).and_then(parse_timestamp);
        item.history = history(raw);

        item.is_subtask = is_subtask(raw);
        item.sprint_ids = sprint_ids(raw);

        item.linked_count = raw.lookup(LINK_PATHS).map(count_entries).unwrap_or(0);
        if let Some(Value::Array(subtasks)) = raw.lookup(SUBTASK_PATHS) {
            item.subtask_count = subtasks.len() as u32;
            item.open_subtask_count =
                subtasks.iter().filter(|s| self.subtask_phase(s).is_open()).count() as u32;
        }

        item.hours_in_status = self.hours_in_status(raw, &item);
        item.is_blocked = is_flagged(raw) || is_blocked_status(&item.status);
        item.is_stalled = item.phase == Phase::InProgress
            && !item.is_blocked
            && item.hours_in_status > self.config.stall_threshold_for(&item.item_type);

        Some(item)
    }

    /// Phase of an embedded sub-task record.
    fn subtask_phase(&self, subtask: &Value) -> Phase {
        let record = RawIssue(subtask.clone());
        if let Some(category) =
            record.lookup_str(&["fields.status.statusCategory.key", "status.statusCategory.key"])
        {
            return Phase::from_category(category);
        }
        let status = record.lookup_str(STATUS_PATHS).unwrap_or_default();
        let item_type = record.lookup_str(TYPE_PATHS);
        self.topology.resolve_phase(status, item_type)
    }

    fn hours_in_status(&self, raw: &RawIssue, item: &Item) -> f64 {
        let entered = item
            .history
            .as_ref()
            .and_then(|h| h.last())
            .map(|t| t.at)
            .or_else(|| raw.lookup_str(STATUS_CHANGED_PATHS).and_then(parse_timestamp))
            .or_else(|| raw.lookup_str(UPDATED_PATHS).and_then(parse_timestamp))
            .unwrap_or(item.created_at);

        let hours = (self.now - entered).num_seconds() as f64 / 3600.0;
        hours.max(0.0)
    }
}

/// String form of a string or number value.
fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn count_entries(value: &Value) -> u32 {
    match value {
        Value::Array(entries) => entries.len() as u32,
        Value::Number(n) => n.as_u64().unwrap_or(0) as u32,
        _ => 0,
    }
}

/// Sub-task level, from the item type when the record says so.
///
/// A Jira parent is not enough: stories under an epic carry one too. Only
/// a parent at the standard level makes the child a sub-task. Plain
/// records without type metadata fall back to having any parent.
fn is_subtask(raw: &RawIssue) -> bool {
    if let Some(flag) =
        raw.lookup(&["fields.issuetype.subtask", "issuetype.subtask"]).and_then(Value::as_bool)
    {
        return flag;
    }
    if let Some(level) = raw.lookup(&["fields.issuetype.hierarchyLevel"]).and_then(Value::as_i64) {
        return level < 0;
    }
    if let Some(level) =
        raw.lookup(&["fields.parent.fields.issuetype.hierarchyLevel"]).and_then(Value::as_i64)
    {
        return level == 0;
    }
    raw.lookup(&["fields"]).is_none() && raw.lookup(&["parent", "parentKey"]).is_some()
}

/// Whole-word match so "Unblocked" or "Blocker Review" stay unblocked.
fn is_blocked_status(status: &str) -> bool {
    status
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| BLOCKED_WORDS.iter().any(|b| word.eq_ignore_ascii_case(b)))
}

/// IDs of every sprint the record belongs to.
fn sprint_ids(raw: &RawIssue) -> Vec<u64> {
    let mut ids = Vec::new();
    if let Some(value) = raw.lookup(SPRINT_PATHS) {
        collect_sprint_ids(value, &mut ids);
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn collect_sprint_ids(value: &Value, ids: &mut Vec<u64>) {
    match value {
        Value::Array(entries) => entries.iter().for_each(|e| collect_sprint_ids(e, ids)),
        Value::Object(sprint) => ids.extend(sprint.get("id").and_then(Value::as_u64)),
        Value::Number(n) => ids.extend(n.as_u64()),
        Value::String(s) => ids.extend(legacy_sprint_id(s)),
        _ => {}
    }
}

/// Older Jira servers send sprints as `...Sprint@1f2a[id=70,rapidViewId=7,...]`.
fn legacy_sprint_id(text: &str) -> Option<u64> {
    if let Ok(id) = text.trim().parse() {
        return Some(id);
    }
    let rest = &text[text.find("[id=")? + 4..];
    rest.split(|c: char| !c.is_ascii_digit()).next()?.parse().ok()
}

/// Jira's flag is a multi-select custom field; snapshots may use a bool.
fn is_flagged(raw: &RawIssue) -> bool {
    match raw.lookup(&["fields.flagged", "fields.customfield_10021", "flagged"]) {
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Array(values)) => !values.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        _ => false,
    }
}

/// Status changelog, oldest first. `None` when the record carries none.
fn history(raw: &RawIssue) -> Option<Vec<StatusTransition>> {
    let mut transitions = Vec::new();

    if let Some(Value::Array(histories)) = raw.lookup(&["changelog.histories"]) {
        for entry in histories {
            let Some(at) = entry.get("created").and_then(Value::as_str).and_then(parse_timestamp)
            else {
                continue;
            };
            let changes = entry.get("items").and_then(Value::as_array).into_iter().flatten();
            for change in changes {
                if change.get("field").and_then(Value::as_str) != Some("status") {
                    continue;
                }
                if let Some(to) = change.get("toString").and_then(Value::as_str) {
                    transitions.push(StatusTransition { at, to_status: to.to_string() });
                }
            }
        }
    } else if let Some(value) = raw.lookup(&["history"]) {
        let plain: Vec<PlainTransition> = serde_json::from_value(value.clone()).ok()?;
        transitions.extend(plain.into_iter().filter_map(|t| {
            parse_timestamp(&t.at).map(|at| StatusTransition { at, to_status: t.to_status })
        }));
    } else {
        return None;
    }

    transitions.sort_by_key(|t| t.at);
    Some(transitions)
}
