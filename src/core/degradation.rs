//! Graceful degradation bookkeeping.
//!
//! Every upstream feed may be unavailable. The pipeline never fails a
//! refresh because of it; instead it substitutes the most conservative
//! value and records what was substituted so the dashboard can render
//! "metric unavailable" placeholders.

use std::fmt;

use serde::Serialize;

use crate::source::SourceError;

/// Upstream feeds a refresh depends on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataFeed {
    /// Project classification
    Project,
    /// Board listing
    Boards,
    /// Active/future sprint lookup
    Sprints,
    /// Board column configuration (WIP limits)
    BoardConfiguration,
    /// Workflow status schema
    Workflow,
    /// Item snapshot
    Items,
}

impl fmt::Display for DataFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFeed::Project => write!(f, "Project metadata"),
            DataFeed::Boards => write!(f, "Boards"),
            DataFeed::Sprints => write!(f, "Sprints"),
            DataFeed::BoardConfiguration => write!(f, "Board configuration"),
            DataFeed::Workflow => write!(f, "Workflow schema"),
            DataFeed::Items => write!(f, "Items"),
        }
    }
}

/// Reason why a feed is degraded.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum DegradationReason {
    /// Credentials missing or rejected
    Unauthorized,
    /// Resource does not exist or is not visible
    NotFound,
    /// Tracker throttled us
    RateLimited,
    /// Network failure, timeout, or server error
    Unavailable(String),
    /// Response could not be understood
    Malformed(String),
}

impl fmt::Display for DegradationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DegradationReason::Unauthorized => write!(f, "missing or rejected credentials"),
            DegradationReason::NotFound => write!(f, "not found"),
            DegradationReason::RateLimited => write!(f, "rate limited by the tracker"),
            DegradationReason::Unavailable(s) => write!(f, "unavailable ({})", s),
            DegradationReason::Malformed(s) => write!(f, "unreadable response ({})", s),
        }
    }
}

impl From<&SourceError> for DegradationReason {
    fn from(error: &SourceError) -> Self {
        match error {
            SourceError::Unauthorized => Self::Unauthorized,
            SourceError::NotFound(_) => Self::NotFound,
            SourceError::RateLimited => Self::RateLimited,
            SourceError::Parse(msg) => Self::Malformed(msg.clone()),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

/// Information about one degraded feed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DegradedFeed {
    /// The feed that failed
    pub feed: DataFeed,
    /// Why it failed
    pub reason: DegradationReason,
    /// What was substituted
    pub fallback: String,
}

impl DegradedFeed {
    /// Create a degraded feed record with the default fallback text.
    pub fn new(feed: DataFeed, reason: DegradationReason) -> Self {
        let fallback = Self::default_fallback(feed).to_string();
        Self { feed, reason, fallback }
    }

    fn default_fallback(feed: DataFeed) -> &'static str {
        match feed {
            DataFeed::Project | DataFeed::Boards => "Unstructured board model",
            DataFeed::Sprints => "No sprint label",
            DataFeed::BoardConfiguration => "Configured default WIP limit",
            DataFeed::Workflow => "Empty topology (all statuses NOT_STARTED)",
            DataFeed::Items => "Metrics unavailable",
        }
    }
}

/// Degradations collected over one refresh.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct DegradationReport {
    details: Vec<DegradedFeed>,
}

impl DegradationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failed feed. Only the first failure per feed is kept.
    pub fn degrade(&mut self, feed: DataFeed, reason: DegradationReason) {
        if !self.is_degraded(feed) {
            tracing::warn!(feed = %feed, reason = %reason, "Falling back");
            self.details.push(DegradedFeed::new(feed, reason));
        }
    }

    /// Record a source error against a feed.
    pub fn record(&mut self, feed: DataFeed, error: &SourceError) {
        self.degrade(feed, DegradationReason::from(error));
    }

    /// Merge another report into this one.
    pub fn extend(&mut self, other: DegradationReport) {
        for detail in other.details {
            if !self.is_degraded(detail.feed) {
                self.details.push(detail);
            }
        }
    }

    /// Check if a feed is degraded.
    pub fn is_degraded(&self, feed: DataFeed) -> bool {
        self.details.iter().any(|d| d.feed == feed)
    }

    /// Check if anything is degraded.
    pub fn has_degradations(&self) -> bool {
        !self.details.is_empty()
    }

    /// All degraded feeds in the order they failed.
    pub fn degraded_feeds(&self) -> &[DegradedFeed] {
        &self.details
    }

    /// Get a summary of degraded feeds for display.
    pub fn summary(&self) -> String {
        if self.details.is_empty() {
            return String::new();
        }

        let feeds: Vec<_> = self.details.iter().map(|d| d.feed.to_string()).collect();
        format!("Degraded: {}", feeds.join(", "))
    }
}

/// Value paired with whether it came from a fallback.
#[derive(Debug, Clone)]
pub struct FallbackResult<T> {
    /// The result value
    pub value: T,
    /// Degradations that produced it
    pub degradations: DegradationReport,
}

impl<T> FallbackResult<T> {
    /// A value produced without any fallback.
    pub fn primary(value: T) -> Self {
        Self { value, degradations: DegradationReport::new() }
    }

    /// A value produced with the given degradations.
    pub fn degraded(value: T, degradations: DegradationReport) -> Self {
        Self { value, degradations }
    }

    /// Whether any fallback was used.
    pub fn used_fallback(&self) -> bool {
        self.degradations.has_degradations()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degradation_report() {
        let mut report = DegradationReport::new();
        assert!(!report.has_degradations());

        report.degrade(DataFeed::Boards, DegradationReason::Unauthorized);
        assert!(report.has_degradations());
        assert!(report.is_degraded(DataFeed::Boards));
        assert!(!report.is_degraded(DataFeed::Items));
    }

    #[test]
    fn test_first_failure_per_feed_wins() {
        let mut report = DegradationReport::new();
        report.degrade(DataFeed::Items, DegradationReason::RateLimited);
        report.degrade(DataFeed::Items, DegradationReason::NotFound);

        assert_eq!(report.degraded_feeds().len(), 1);
        assert_eq!(report.degraded_feeds()[0].reason, DegradationReason::RateLimited);
    }

    #[test]
    fn test_source_error_mapping() {
        assert_eq!(
            DegradationReason::from(&SourceError::NotFound("board 7".into())),
            DegradationReason::NotFound
        );
        assert_eq!(
            DegradationReason::from(&SourceError::Parse("bad json".into())),
            DegradationReason::Malformed("bad json".into())
        );
        assert!(matches!(
            DegradationReason::from(&SourceError::Unavailable("503".into())),
            DegradationReason::Unavailable(_)
        ));
    }

    #[test]
    fn test_default_fallbacks() {
        let feed = DegradedFeed::new(DataFeed::Items, DegradationReason::Unauthorized);
        assert_eq!(feed.fallback, "Metrics unavailable");
        let feed = DegradedFeed::new(DataFeed::Boards, DegradationReason::Unauthorized);
        assert!(feed.fallback.contains("Unstructured"));
    }

    #[test]
    fn test_extend_and_summary() {
        let mut report = DegradationReport::new();
        report.degrade(DataFeed::Workflow, DegradationReason::NotFound);

        let mut other = DegradationReport::new();
        other.degrade(DataFeed::Workflow, DegradationReason::RateLimited);
        other.degrade(DataFeed::Sprints, DegradationReason::RateLimited);
        report.extend(other);

        assert_eq!(report.degraded_feeds().len(), 2);
        let summary = report.summary();
        assert!(summary.contains("Workflow schema"));
        assert!(summary.contains("Sprints"));
    }

    #[test]
    fn test_fallback_result() {
        let primary = FallbackResult::primary(42);
        assert!(!primary.used_fallback());

        let mut report = DegradationReport::new();
        report.degrade(DataFeed::Project, DegradationReason::Unauthorized);
        let degraded = FallbackResult::degraded(0, report);
        assert!(degraded.used_fallback());
    }
}
