//! Metric computation.
//!
//! Turns a phase-tagged item snapshot into pace, load, and health
//! indicators. Everything here is a pure function of its inputs and the
//! `now` it is given.

mod flow;
mod health;
mod pace;

pub use flow::{ItemCounts, MeasurementBasis, MetricEngine, MetricSnapshot, TimeAggregate};
pub use health::{classify_health, HealthStatus};
pub use pace::{completion_percent, compute_pace};

/// Placeholder shown for a metric that could not be computed.
pub const UNAVAILABLE: &str = "--";

/// Format a percentage, or the placeholder when unavailable.
pub fn format_percent(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.0}%", v),
        _ => UNAVAILABLE.to_string(),
    }
}

/// Format a signed percentage (e.g., pace variance).
pub fn format_signed_percent(value: f64) -> String {
    if value.is_finite() {
        format!("{:+.1}%", value)
    } else {
        UNAVAILABLE.to_string()
    }
}

/// Format a duration in hours as days or hours.
pub fn format_hours(value: Option<f64>) -> String {
    match value {
        Some(h) if h.is_finite() && h >= 48.0 => format!("{:.1}d", h / 24.0),
        Some(h) if h.is_finite() => format!("{:.1}h", h),
        _ => UNAVAILABLE.to_string(),
    }
}
