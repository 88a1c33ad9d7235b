//! Sampling, ranking, and deduplication of recommendations.

use std::collections::HashSet;

use serde::Serialize;

use super::catalog::{ActionDefinition, ActionId, Relevance};
use super::rules::{Evaluation, RuleRegistry};
use crate::core::EngineConfig;
use crate::model::{BoardContext, Item, Phase};

/// An action recommended for one item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionRecommendation {
    pub action: ActionDefinition,
    pub item_key: String,
    pub relevance: Relevance,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Produces ranked recommendations for a set of items.
#[derive(Debug, Clone, Default)]
pub struct RecommendationEngine {
    config: EngineConfig,
    registry: RuleRegistry,
}

impl RecommendationEngine {
    pub fn new(config: EngineConfig) -> Self {
        Self { config, registry: RuleRegistry::standard() }
    }

    /// Replace the rule registry.
    pub fn with_registry(mut self, registry: RuleRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Evaluate a single action against a single item.
    pub fn evaluate(&self, action: ActionId, item: &Item, board: &BoardContext) -> Evaluation {
        self.registry.evaluate(action, item, board, &self.config)
    }

    /// Every catalog action evaluated against one item, hidden ones included.
    pub fn evaluate_all(&self, item: &Item, board: &BoardContext) -> Vec<(ActionId, Evaluation)> {
        ActionId::ALL.into_iter().map(|id| (id, self.evaluate(id, item, board))).collect()
    }

    /// The working set: stalled items, then blocked, then aging in-progress.
    ///
    /// Each bucket is ordered longest-in-status first and capped; done
    /// items are skipped and no item appears twice.
    pub fn sample<'a>(&self, items: &'a [Item]) -> Vec<&'a Item> {
        let cap = self.config.sample_per_bucket;
        let mut open: Vec<&Item> = items.iter().filter(|i| !i.is_done()).collect();
        open.sort_by(|a, b| b.hours_in_status.total_cmp(&a.hours_in_status));

        let buckets: [fn(&Item) -> bool; 3] = [
            |i| i.is_stalled,
            |i| i.is_blocked,
            |i| i.phase == Phase::InProgress,
        ];

        let mut seen = HashSet::new();
        let mut sampled = Vec::new();
        for in_bucket in buckets {
            let picked: Vec<&Item> = open
                .iter()
                .copied()
                .filter(|i| in_bucket(i) && !seen.contains(i.key.as_str()))
                .take(cap)
                .collect();
            for item in picked {
                seen.insert(item.key.as_str());
                sampled.push(item);
            }
        }
        sampled
    }

    /// Rank recommendations across the sampled items.
    ///
    /// `actions` restricts evaluation to a subset of the catalog. Hidden
    /// results are dropped, `(action, item)` pairs are unique, and the
    /// list is sorted most urgent first and truncated.
    pub fn recommend(
        &self,
        items: &[Item],
        board: &BoardContext,
        actions: Option<&[ActionId]>,
    ) -> Vec<ActionRecommendation> {
        let actions: Vec<ActionId> = match actions {
            Some(subset) => ActionId::ALL.into_iter().filter(|id| subset.contains(id)).collect(),
            None => ActionId::ALL.to_vec(),
        };

        let sampled = self.sample(items);
        let mut seen: HashSet<(ActionId, &str)> = HashSet::new();
        let mut ranked = Vec::new();

        for item in &sampled {
            for &id in &actions {
                if !seen.insert((id, item.key.as_str())) {
                    continue;
                }
                let evaluation = self.evaluate(id, item, board);
                if !evaluation.is_visible() {
                    continue;
                }
                ranked.push(ActionRecommendation {
                    action: *id.definition(),
                    item_key: item.key.clone(),
                    relevance: evaluation.relevance,
                    reason: evaluation.reason,
                });
            }
        }

        // Stable: sample order, then catalog order, within a tier
        ranked.sort_by_key(|r| r.relevance);
        ranked.truncate(self.config.max_recommendations);

        tracing::debug!(
            sampled = sampled.len(),
            actions = actions.len(),
            returned = ranked.len(),
            "Ranked recommendations"
        );

        ranked
    }
}
