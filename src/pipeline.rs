//! Dashboard refresh pipeline.
//!
//! One refresh pulls a full snapshot from the tracker and re-derives every
//! output from it. Upstream failures never abort a refresh; they become
//! entries in the snapshot's degradation report.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::core::{Config, DataFeed, DegradationReport, RetryConfig};
use crate::ingest::Ingestor;
use crate::metrics::{MetricEngine, MetricSnapshot};
use crate::model::{BoardContext, Item, Phase};
use crate::narrator::Narrator;
use crate::recommend::{ActionRecommendation, RecommendationEngine};
use crate::source::{fetch_with_retry, TrackerSource};
use crate::topology::{BoardDetector, TopologyResolver, WorkflowTopology};

/// Everything the dashboard renders for one project.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub project_key: String,
    pub generated_at: DateTime<Utc>,
    pub board: BoardContext,
    pub topology: WorkflowTopology,
    /// `None` when items could not be fetched
    pub metrics: Option<MetricSnapshot>,
    pub recommendations: Vec<ActionRecommendation>,
    pub summary: String,
    pub degraded: DegradationReport,
    /// Normalized items the outputs were derived from
    #[serde(skip)]
    pub items: Vec<Item>,
}

impl DashboardSnapshot {
    /// Find an item by key (case-insensitive).
    pub fn item(&self, key: &str) -> Option<&Item> {
        self.items.iter().find(|i| i.key.eq_ignore_ascii_case(key))
    }
}

/// Runs refreshes against a tracker source.
pub struct Dashboard {
    source: Box<dyn TrackerSource>,
    config: Config,
    retry: RetryConfig,
}

impl Dashboard {
    pub fn new(source: Box<dyn TrackerSource>, config: Config) -> Self {
        let retry = config.source.retry_config();
        Self { source, config, retry }
    }

    /// Override the retry policy (tests use `RetryConfig::no_retry`).
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn source(&self) -> &dyn TrackerSource {
        self.source.as_ref()
    }

    /// Detect the board context only.
    pub async fn board_context(
        &self,
        project_key: &str,
        now: DateTime<Utc>,
    ) -> (BoardContext, DegradationReport) {
        let detected = BoardDetector::new(self.source())
            .with_retry(self.retry.clone())
            .detect_board_context(project_key, now)
            .await;
        (detected.value, detected.degradations)
    }

    /// Build the workflow topology only.
    pub async fn topology(&self, project_key: &str) -> (WorkflowTopology, DegradationReport) {
        let built = TopologyResolver::new(self.source())
            .with_retry(self.retry.clone())
            .build_topology(project_key)
            .await;
        (built.value, built.degradations)
    }

    /// Run a full refresh.
    pub async fn refresh(&self, project_key: &str, now: DateTime<Utc>) -> DashboardSnapshot {
        let engine_config = &self.config.engine;
        tracing::debug!(project = project_key, source = self.source.name(), "Refreshing");

        let (mut board, mut degraded) = self.board_context(project_key, now).await;

        // Schema and items are independent; fetch them together.
        let (built, fetched) = futures::join!(
            self.topology(project_key),
            fetch_with_retry(&self.retry, "issues", || self.source.issues(project_key)),
        );
        let (topology, topology_degraded) = built;
        degraded.extend(topology_degraded);

        let items = match fetched {
            Ok(raw) => Some(Ingestor::new(&topology, engine_config, now).normalize_all(&raw)),
            Err(e) => {
                degraded.record(DataFeed::Items, &e);
                None
            }
        };

        let metric_engine = MetricEngine::new(engine_config.clone());
        board.wip_limit = metric_engine.effective_wip_limit(&board);

        let (metrics, recommendations) = match &items {
            Some(items) => {
                let in_progress = items.iter().filter(|i| i.phase == Phase::InProgress).count();
                board = board.with_wip_current(in_progress as u32);

                let metrics = metric_engine.compute_flow_metrics(items, &topology, &board, now);
                let recommendations =
                    RecommendationEngine::new(engine_config.clone()).recommend(items, &board, None);
                (Some(metrics), recommendations)
            }
            None => (None, Vec::new()),
        };

        let summary = Narrator::new(engine_config.narrator_max_clauses)
            .summarize(&board, metrics.as_ref());

        if degraded.has_degradations() {
            tracing::info!(project = project_key, "{}", degraded.summary());
        }

        DashboardSnapshot {
            project_key: project_key.to_string(),
            generated_at: now,
            board,
            topology,
            metrics,
            recommendations,
            summary,
            degraded,
            items: items.unwrap_or_default(),
        }
    }
}
