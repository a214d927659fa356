//! Campaign window and week arithmetic.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

/// Length of one campaign week.
#[must_use]
pub fn week() -> Duration {
    Duration::days(7)
}

/// A time-boxed campaign run.
///
/// A new row is stored for every run; ending a campaign only flips
/// `is_active`, so past runs stay queryable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Campaign {
    /// Storage row id.
    pub id: i64,
    /// Inclusive start.
    pub start_time: DateTime<Utc>,
    /// Exclusive end.
    pub end_time: DateTime<Utc>,
    /// Cleared once the final week has been settled.
    pub is_active: bool,
}

impl Campaign {
    /// Number of (possibly partial) weeks the campaign spans.
    #[must_use]
    pub fn total_weeks(&self) -> u32 {
        let span = self.end_time - self.start_time;
        if span <= Duration::zero() {
            return 0;
        }
        let full = span.num_seconds() / week().num_seconds();
        let partial = i64::from(span.num_seconds() % week().num_seconds() != 0);
        u32::try_from(full + partial).unwrap_or(u32::MAX)
    }

    /// 1-based week `now` falls in, capped to the campaign length.
    /// Returns 0 before the campaign starts.
    #[must_use]
    pub fn current_week(&self, now: DateTime<Utc>) -> u32 {
        if now < self.start_time {
            return 0;
        }
        let elapsed = (now - self.start_time).num_seconds() / week().num_seconds();
        let week_no = u32::try_from(elapsed + 1).unwrap_or(u32::MAX);
        week_no.min(self.total_weeks())
    }

    /// End of week `week_no` (1-based), clamped to the campaign end.
    #[must_use]
    pub fn week_boundary(&self, week_no: u32) -> DateTime<Utc> {
        let boundary = self.start_time + week() * i32::try_from(week_no).unwrap_or(i32::MAX);
        boundary.min(self.end_time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn four_week_campaign() -> Campaign {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single().unwrap_or_default();
        Campaign {
            id: 1,
            start_time: start,
            end_time: start + week() * 4,
            is_active: true,
        }
    }

    #[test]
    fn four_weeks_span() {
        assert_eq!(four_week_campaign().total_weeks(), 4);
    }

    #[test]
    fn current_week_is_one_based_and_capped() {
        let c = four_week_campaign();
        assert_eq!(c.current_week(c.start_time - Duration::hours(1)), 0);
        assert_eq!(c.current_week(c.start_time), 1);
        assert_eq!(c.current_week(c.start_time + Duration::days(8)), 2);
        assert_eq!(c.current_week(c.end_time + Duration::days(30)), 4);
    }

    #[test]
    fn boundary_is_clamped_to_end() {
        let mut c = four_week_campaign();
        c.end_time = c.start_time + Duration::days(10);
        assert_eq!(c.total_weeks(), 2);
        assert_eq!(c.week_boundary(1), c.start_time + week());
        assert_eq!(c.week_boundary(2), c.end_time);
    }
}
