//! Sprint pace: actual completion against a linear burn-up.

use chrono::{DateTime, Utc};

use crate::model::Item;

/// Signed gap between actual and time-expected completion, in percent.
///
/// Negative means behind schedule. Returns 0 when either boundary is
/// missing or the period has no positive duration.
pub fn compute_pace(
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
    completion_percent: f64,
    now: DateTime<Utc>,
) -> f64 {
    let (Some(start), Some(end)) = (start, end) else {
        return 0.0;
    };

    let duration = (end - start).num_seconds();
    if duration <= 0 || !completion_percent.is_finite() {
        return 0.0;
    }

    let elapsed = (now - start).num_seconds() as f64;
    let expected = (elapsed / duration as f64).clamp(0.0, 1.0) * 100.0;
    completion_percent - expected
}

/// Share of work done, in percent.
///
/// Weighted by story points when any item carries an estimate, by item
/// count otherwise. Unestimated items weigh nothing in the first case.
pub fn completion_percent<'a, I>(items: I) -> f64
where
    I: IntoIterator<Item = &'a Item>,
{
    let mut count = 0usize;
    let mut done = 0usize;
    let mut points = 0.0;
    let mut done_points = 0.0;
    let mut estimated = false;

    for item in items {
        count += 1;
        done += usize::from(item.is_done());
        if let Some(p) = item.story_points {
            estimated = true;
            points += p;
            if item.is_done() {
                done_points += p;
            }
        }
    }

    if count == 0 {
        return 0.0;
    }
    if estimated {
        return if points > 0.0 { done_points / points * 100.0 } else { 0.0 };
    }
    done as f64 / count as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::model::Phase;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_pace_missing_bounds() {
        let now = start() + Duration::days(3);
        assert_eq!(compute_pace(None, Some(now), 40.0, now), 0.0);
        assert_eq!(compute_pace(Some(start()), None, 40.0, now), 0.0);
        assert_eq!(compute_pace(None, None, 100.0, now), 0.0);
    }

    #[test]
    fn test_pace_non_positive_duration() {
        let now = start() + Duration::days(3);
        assert_eq!(compute_pace(Some(start()), Some(start()), 10.0, now), 0.0);
        assert_eq!(compute_pace(Some(start()), Some(start() - Duration::days(1)), 90.0, now), 0.0);
    }

    #[test]
    fn test_pace_linear_expectation() {
        let end = start() + Duration::days(10);
        let halfway = start() + Duration::days(5);
        assert!((compute_pace(Some(start()), Some(end), 30.0, halfway) - -20.0).abs() < 1e-9);
        assert!((compute_pace(Some(start()), Some(end), 70.0, halfway) - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_pace_clamps_elapsed() {
        let end = start() + Duration::days(10);
        let before = start() - Duration::days(2);
        let after = end + Duration::days(2);
        assert!((compute_pace(Some(start()), Some(end), 0.0, before)).abs() < 1e-9);
        assert!((compute_pace(Some(start()), Some(end), 100.0, after)).abs() < 1e-9);
    }

    fn item(key: &str, phase: Phase, points: Option<f64>) -> Item {
        let mut item = Item::new(key, key, start());
        item.phase = phase;
        item.story_points = points;
        item
    }

    #[test]
    fn test_completion_by_points() {
        let items = vec![
            item("A-1", Phase::Done, Some(3.0)),
            item("A-2", Phase::InProgress, Some(1.0)),
            item("A-3", Phase::Done, None),
        ];
        assert!((completion_percent(&items) - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_completion_by_count() {
        let items = vec![
            item("A-1", Phase::Done, None),
            item("A-2", Phase::NotStarted, None),
            item("A-3", Phase::InProgress, None),
            item("A-4", Phase::Done, None),
        ];
        assert!((completion_percent(&items) - 50.0).abs() < 1e-9);
        assert_eq!(completion_percent(&[] as &[Item]), 0.0);
    }
}
