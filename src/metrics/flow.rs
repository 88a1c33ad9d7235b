//! Flow metrics over a phase-tagged item snapshot.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::health::{classify_health, HealthStatus};
use super::pace::{completion_percent, compute_pace};
use crate::core::EngineConfig;
use crate::model::{BoardContext, BoardModel, Item, Phase};
use crate::topology::WorkflowTopology;

/// Whether a time aggregate is a true measurement or a stand-in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementBasis {
    /// Derived from status transition history
    Measured,
    /// Creation-based elapsed time standing in for the real metric
    Proxy,
}

/// Summary statistics over a set of durations, in hours.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeAggregate {
    pub average_hours: f64,
    pub median_hours: f64,
    /// 85th percentile (nearest rank)
    pub p85_hours: f64,
    pub samples: usize,
    pub basis: MeasurementBasis,
}

impl TimeAggregate {
    /// Aggregate samples. Returns `None` for an empty set.
    pub fn from_samples(mut samples: Vec<f64>, basis: MeasurementBasis) -> Option<Self> {
        samples.retain(|s| s.is_finite());
        if samples.is_empty() {
            return None;
        }
        samples.sort_by(f64::total_cmp);

        let n = samples.len();
        let average_hours = samples.iter().sum::<f64>() / n as f64;
        let median_hours = if n % 2 == 0 {
            (samples[n / 2 - 1] + samples[n / 2]) / 2.0
        } else {
            samples[n / 2]
        };
        let rank = ((0.85 * n as f64).ceil() as usize).clamp(1, n);
        let p85_hours = samples[rank - 1];

        Some(Self { average_hours, median_hours, p85_hours, samples: n, basis })
    }

    pub fn is_proxy(&self) -> bool {
        self.basis == MeasurementBasis::Proxy
    }
}

/// Item counts by phase and flag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub total: usize,
    pub not_started: usize,
    pub in_progress: usize,
    pub done: usize,
    pub stalled: usize,
    pub blocked: usize,
}

impl ItemCounts {
    fn from_items(items: &[Item]) -> Self {
        let mut counts = Self { total: items.len(), ..Self::default() };
        for item in items {
            match item.phase {
                Phase::NotStarted => counts.not_started += 1,
                Phase::InProgress => counts.in_progress += 1,
                Phase::Done => counts.done += 1,
            }
            counts.stalled += usize::from(item.is_stalled);
            counts.blocked += usize::from(item.is_blocked);
        }
        counts
    }
}

/// Pace, load, and health telemetry for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSnapshot {
    /// Signed percent; negative is behind schedule
    pub pace_variance: f64,
    /// Share of work done, in percent
    pub completion_percent: f64,
    /// Items in progress
    pub wip_current: u32,
    /// Effective WIP limit
    pub wip_limit: Option<u32>,
    /// `wip_current / wip_limit` in percent; `None` without a limit
    pub wip_load: Option<f64>,
    /// Open items per assignee as a percent of capacity
    pub assignee_load: BTreeMap<String, f64>,
    pub health: HealthStatus,
    pub cycle_time: Option<TimeAggregate>,
    pub lead_time: Option<TimeAggregate>,
    pub counts: ItemCounts,
}

/// Computes [`MetricSnapshot`]s.
#[derive(Debug, Clone, Default)]
pub struct MetricEngine {
    config: EngineConfig,
}

impl MetricEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// The board's own limit, else the configured default. Zero means none.
    pub fn effective_wip_limit(&self, board: &BoardContext) -> Option<u32> {
        board.wip_limit.filter(|l| *l > 0).or(self.config.wip_limit).filter(|l| *l > 0)
    }

    /// Compute all flow metrics for a snapshot of items.
    pub fn compute_flow_metrics(
        &self,
        items: &[Item],
        topology: &WorkflowTopology,
        board: &BoardContext,
        now: DateTime<Utc>,
    ) -> MetricSnapshot {
        let counts = ItemCounts::from_items(items);

        let active_sprint =
            board.sprint.as_ref().filter(|_| board.model == BoardModel::Scrum && board.sprint_active);
        let completion = match active_sprint {
            Some(sprint) => sprint_completion(items, sprint.id),
            None => completion_percent(items),
        };
        let pace_variance =
            active_sprint.map_or(0.0, |sprint| compute_pace(sprint.start, sprint.end, completion, now));

        let wip_current = counts.in_progress as u32;
        let wip_limit = self.effective_wip_limit(board);
        let wip_load = wip_limit.map(|limit| f64::from(wip_current) / f64::from(limit) * 100.0);

        let health = classify_health(board.model, pace_variance, wip_load.unwrap_or(0.0));

        let snapshot = MetricSnapshot {
            pace_variance,
            completion_percent: completion,
            wip_current,
            wip_limit,
            wip_load,
            assignee_load: self.assignee_load(items),
            health,
            cycle_time: cycle_time(items, topology, now),
            lead_time: lead_time(items),
            counts,
        };

        tracing::debug!(
            items = items.len(),
            health = %snapshot.health,
            pace = snapshot.pace_variance,
            wip = snapshot.wip_current,
            "Computed flow metrics"
        );

        snapshot
    }

    fn assignee_load(&self, items: &[Item]) -> BTreeMap<String, f64> {
        let mut open: BTreeMap<String, u32> = BTreeMap::new();
        for item in items.iter().filter(|i| !i.is_done()) {
            if let Some(assignee) = &item.assignee {
                *open.entry(assignee.clone()).or_default() += 1;
            }
        }

        let capacity = f64::from(self.config.assignee_capacity.max(1));
        open.into_iter().map(|(name, count)| (name, f64::from(count) / capacity * 100.0)).collect()
    }
}

/// Completion over the sprint's own items.
///
/// Sources that report no sprint membership at all are assumed to serve
/// only the sprint's items.
fn sprint_completion(items: &[Item], sprint_id: u64) -> f64 {
    if items.iter().all(|i| i.sprint_ids.is_empty()) {
        return completion_percent(items);
    }
    completion_percent(items.iter().filter(|i| i.in_sprint(sprint_id)))
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    ((to - from).num_seconds() as f64 / 3600.0).max(0.0)
}

/// First entry into work to the next entry into done, from history.
fn measured_cycle_hours(item: &Item, topology: &WorkflowTopology) -> Option<f64> {
    let history = item.history.as_ref()?;
    let phase_of = |status: &str| topology.resolve_phase(status, Some(&item.item_type));

    let started = history.iter().position(|t| phase_of(&t.to_status) == Phase::InProgress)?;
    let finished = history[started + 1..].iter().find(|t| phase_of(&t.to_status) == Phase::Done)?;
    Some(hours_between(history[started].at, finished.at))
}

fn cycle_time(
    items: &[Item],
    topology: &WorkflowTopology,
    now: DateTime<Utc>,
) -> Option<TimeAggregate> {
    let measured: Vec<f64> = items
        .iter()
        .filter(|i| i.is_done())
        .filter_map(|i| measured_cycle_hours(i, topology))
        .collect();
    if !measured.is_empty() {
        return TimeAggregate::from_samples(measured, MeasurementBasis::Measured);
    }

    let proxy: Vec<f64> = items
        .iter()
        .filter_map(|i| match i.phase {
            Phase::Done => i.resolved_at.map(|r| hours_between(i.created_at, r)),
            Phase::InProgress => Some(hours_between(i.created_at, now)),
            Phase::NotStarted => None,
        })
        .collect();
    TimeAggregate::from_samples(proxy, MeasurementBasis::Proxy)
}

fn lead_time(items: &[Item]) -> Option<TimeAggregate> {
    let samples: Vec<f64> = items
        .iter()
        .filter(|i| i.is_done())
        .filter_map(|i| i.resolved_at.map(|r| hours_between(i.created_at, r)))
        .collect();
    TimeAggregate::from_samples(samples, MeasurementBasis::Measured)
}
