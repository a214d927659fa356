//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::Campaign;

/// Row-limit query parameter for ranked lists.
#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LimitParams {
    /// Number of rows (1 to 100). Defaults to 10.
    #[serde(default = "default_limit")]
    pub limit: usize,
}

const fn default_limit() -> usize {
    10
}

impl Default for LimitParams {
    fn default() -> Self {
        Self {
            limit: default_limit(),
        }
    }
}

impl LimitParams {
    /// Clamps `limit` to the allowed range of 1 to 100.
    #[must_use]
    pub fn clamped(&self) -> usize {
        self.limit.clamp(1, 100)
    }
}

/// Campaign window as reported next to the leaderboard.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CampaignDto {
    /// Inclusive start.
    pub start_time: DateTime<Utc>,
    /// Exclusive end.
    pub end_time: DateTime<Utc>,
    /// Whether the campaign is still running.
    pub is_active: bool,
    /// Number of weeks the campaign spans.
    pub total_weeks: u32,
    /// 1-based week at request time (0 before the start).
    pub current_week: u32,
}

impl CampaignDto {
    /// Builds the view of `campaign` as of `now`.
    #[must_use]
    pub fn new(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self {
            start_time: campaign.start_time,
            end_time: campaign.end_time,
            is_active: campaign.is_active,
            total_weeks: campaign.total_weeks(),
            current_week: campaign.current_week(now),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_is_clamped() {
        assert_eq!(LimitParams { limit: 0 }.clamped(), 1);
        assert_eq!(LimitParams { limit: 500 }.clamped(), 100);
        assert_eq!(LimitParams::default().clamped(), 10);
    }
}
