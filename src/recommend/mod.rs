//! Recommendation policy engine.
//!
//! Scores a fixed catalog of interventions against a small, prioritized
//! sample of items and returns a short ranked list with a reason for each
//! entry. Given the same items, board, and configuration the output is
//! always identical.

mod catalog;
mod engine;
mod rules;

pub use catalog::{
    ActionDefinition, ActionId, Category, Relevance, UnknownAction, WriteOperation, CATALOG,
};
pub use engine::{ActionRecommendation, RecommendationEngine};
pub use rules::{Evaluation, Rule, RuleRegistry};
