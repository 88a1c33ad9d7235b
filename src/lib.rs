//! # Boardpulse
//!
//! Decision support for team work boards - flow telemetry and ranked,
//! explainable interventions for sprint and kanban boards.
//!
//! Boardpulse pulls a snapshot of a project from an issue tracker, works out
//! how the project's board operates, maps its custom statuses onto three
//! canonical phases, and derives pace, load, and health indicators from it.
//! A policy engine then scores a fixed catalog of interventions against the
//! most at-risk items and returns a short, ranked list with a reason for each.
//!
//! ## Features
//!
//! - **Topology Resolution**: Scrum, Kanban, or unstructured; per item type status mapping
//! - **Flow Metrics**: Pace variance, WIP load, assignee load, cycle and lead time
//! - **Recommendations**: Ten interventions, four relevance tiers, deterministic ranking
//! - **Narration**: Plain-language risk summaries for items and boards
//! - **Graceful Degradation**: Upstream failures become "metric unavailable", never errors
//!
//! ## Quick Start
//!
//! ```bash
//! # Against Jira Cloud
//! export JIRA_BASE_URL=https://acme.atlassian.net JIRA_EMAIL=me@acme.io JIRA_API_TOKEN=...
//! boardpulse refresh ENG
//!
//! # Against a captured snapshot
//! boardpulse --snapshot eng.json recommend ENG
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
// Allow common patterns that are intentional in this codebase
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::doc_markdown)]
#![allow(clippy::manual_let_else)]
#![allow(clippy::derivable_impls)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::option_if_let_else)]
#![allow(clippy::needless_lifetimes)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_possible_wrap)]
#![allow(clippy::float_cmp)]
#![allow(clippy::new_without_default)]

pub mod core;
pub mod ingest;
pub mod metrics;
pub mod model;
pub mod narrator;
pub mod pipeline;
pub mod recommend;
pub mod source;
pub mod topology;

pub use core::{Config, DegradationReport, EngineConfig};
pub use metrics::{HealthStatus, MetricEngine, MetricSnapshot};
pub use model::{BoardContext, BoardModel, Item, Phase, Priority};
pub use narrator::{describe, Narrator};
pub use pipeline::{Dashboard, DashboardSnapshot};
pub use recommend::{ActionId, ActionRecommendation, RecommendationEngine, Relevance};
pub use source::{SnapshotSource, SourceError, TrackerSource};
pub use topology::{BoardDetector, TopologyResolver, WorkflowTopology};
