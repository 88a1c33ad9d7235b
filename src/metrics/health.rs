//! Composite health classification.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::BoardModel;

/// Overall board health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Optimal,
    Warning,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Optimal => write!(f, "OPTIMAL"),
            Self::Warning => write!(f, "WARNING"),
            Self::Critical => write!(f, "CRITICAL"),
        }
    }
}

/// Classify health from pace variance and WIP load (both in percent).
///
/// Sprint boards weigh both. Flow and unstructured boards ignore pace,
/// since there is no schedule to fall behind on.
pub fn classify_health(model: BoardModel, pace_variance: f64, wip_load: f64) -> HealthStatus {
    let pace = if pace_variance.is_finite() { pace_variance } else { 0.0 };
    let load = if wip_load.is_finite() { wip_load } else { 0.0 };

    if model.is_sprint_based() {
        if pace <= -20.0 || load > 120.0 {
            HealthStatus::Critical
        } else if pace < -10.0 || load > 90.0 {
            HealthStatus::Warning
        } else {
            HealthStatus::Optimal
        }
    } else if load > 100.0 {
        HealthStatus::Critical
    } else if load > 85.0 {
        HealthStatus::Warning
    } else {
        HealthStatus::Optimal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sprint_board_pace_boundaries() {
        assert_eq!(classify_health(BoardModel::Scrum, -20.0, 0.0), HealthStatus::Critical);
        assert_eq!(classify_health(BoardModel::Scrum, -19.999, 90.0), HealthStatus::Warning);
        assert_eq!(classify_health(BoardModel::Scrum, -10.0, 50.0), HealthStatus::Optimal);
        assert_eq!(classify_health(BoardModel::Scrum, 15.0, 50.0), HealthStatus::Optimal);
    }

    #[test]
    fn test_sprint_board_wip_boundaries() {
        assert_eq!(classify_health(BoardModel::Scrum, 0.0, 120.0), HealthStatus::Warning);
        assert_eq!(classify_health(BoardModel::Scrum, 0.0, 120.1), HealthStatus::Critical);
        assert_eq!(classify_health(BoardModel::Scrum, 0.0, 90.0), HealthStatus::Optimal);
        assert_eq!(classify_health(BoardModel::Scrum, 0.0, 90.1), HealthStatus::Warning);
    }

    #[test]
    fn test_flow_board_ignores_pace() {
        assert_eq!(classify_health(BoardModel::Kanban, -80.0, 50.0), HealthStatus::Optimal);
        assert_eq!(classify_health(BoardModel::Kanban, 0.0, 120.0), HealthStatus::Critical);
        assert_eq!(classify_health(BoardModel::Kanban, 0.0, 100.0), HealthStatus::Warning);
        assert_eq!(classify_health(BoardModel::Kanban, 0.0, 85.0), HealthStatus::Optimal);
        assert_eq!(classify_health(BoardModel::Unknown, -50.0, 86.0), HealthStatus::Warning);
    }

    #[test]
    fn test_non_finite_inputs_are_neutral() {
        assert_eq!(classify_health(BoardModel::Scrum, f64::NAN, f64::NAN), HealthStatus::Optimal);
        assert_eq!(
            classify_health(BoardModel::Kanban, 0.0, f64::INFINITY),
            HealthStatus::Optimal
        );
    }
}
