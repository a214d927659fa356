//! Per-user DTOs: task status and points history.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{Campaign, PointsHistoryEntry, RewardRules, User};
use crate::persistence::SwapSummary;

/// Response body for `GET /user/{address}/tasks`.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TasksResponse {
    /// One-time onboarding task.
    pub onboarding: OnboardingTask,
    /// Recurring weekly share-pool task.
    pub share_pool: SharePoolTask,
    /// Latest campaign, if one was ever started.
    pub campaign: Option<TaskCampaign>,
}

/// Onboarding task status.
#[derive(Debug, Serialize, ToSchema)]
pub struct OnboardingTask {
    /// Whether the bonus has been awarded.
    pub completed: bool,
    /// Lifetime USD swap volume of the user.
    #[schema(value_type = String)]
    pub amount: Decimal,
    /// Onboarding points awarded (0 until completed).
    pub points: i64,
}

/// Share-pool task status.
#[derive(Debug, Serialize, ToSchema)]
pub struct SharePoolTask {
    /// Whether the user has any swap volume.
    pub completed: bool,
    /// Lifetime USD swap volume of the user.
    #[schema(value_type = String)]
    pub amount: Decimal,
    /// Share-pool points received so far.
    pub points: i64,
    /// Onboarded, and no share-pool payout within the last window.
    pub eligible: bool,
}

/// Campaign window in the tasks view.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TaskCampaign {
    /// Inclusive start.
    pub start_time: DateTime<Utc>,
    /// Exclusive end.
    pub end_time: DateTime<Utc>,
    /// Whether the campaign is still running.
    pub is_active: bool,
}

impl TasksResponse {
    /// Assembles the tasks view for `user` as of `now`.
    ///
    /// Share-pool eligibility is measured from the last payout, or from the
    /// campaign start when the user has never been paid.
    #[must_use]
    pub fn new(
        user: &User,
        summary: &SwapSummary,
        campaign: Option<&Campaign>,
        rules: &RewardRules,
        now: DateTime<Utc>,
    ) -> Self {
        let last_payout = summary
            .last_share_pool_at
            .or_else(|| campaign.map(|c| c.start_time));
        let cooled_down = last_payout.is_none_or(|at| at <= now - rules.share_pool_window);
        Self {
            onboarding: OnboardingTask {
                completed: user.onboarding_completed,
                amount: summary.total_volume,
                points: user.onboarding_points,
            },
            share_pool: SharePoolTask {
                completed: summary.total_volume > Decimal::ZERO,
                amount: summary.total_volume,
                points: summary.share_pool_points,
                eligible: user.onboarding_completed && cooled_down,
            },
            campaign: campaign.map(|c| TaskCampaign {
                start_time: c.start_time,
                end_time: c.end_time,
                is_active: c.is_active,
            }),
        }
    }
}

/// One row of `GET /user/{address}/points`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PointsHistoryItem {
    /// Signed point amount.
    pub points: i64,
    /// Reason tag (`Onboarding`, `Swap`, `Weekly Share Pool Task`).
    pub reason: String,
    /// When the points were written.
    pub timestamp: DateTime<Utc>,
}

impl From<PointsHistoryEntry> for PointsHistoryItem {
    fn from(entry: PointsHistoryEntry) -> Self {
        Self {
            points: entry.points,
            reason: entry.reason.as_str().to_string(),
            timestamp: entry.timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WalletAddress;
    use crate::domain::campaign::week;
    use alloy::primitives::Address;

    fn onboarded() -> User {
        User {
            id: 1,
            address: WalletAddress::new(Address::repeat_byte(1)),
            onboarding_completed: true,
            onboarding_points: 100,
            total_points: 350,
        }
    }

    fn summary(paid_at: Option<DateTime<Utc>>) -> SwapSummary {
        SwapSummary {
            swap_count: 2,
            total_volume: Decimal::from(2_500),
            share_pool_points: paid_at.map_or(0, |_| 40),
            last_share_pool_at: paid_at,
        }
    }

    #[test]
    fn tasks_use_camel_case_keys() {
        let now = Utc::now();
        let view = TasksResponse::new(&onboarded(), &summary(None), None, &RewardRules::default(), now);
        let json = serde_json::to_value(&view).unwrap_or_default();

        assert_eq!(json["onboarding"]["completed"], true);
        assert_eq!(json["onboarding"]["points"], 100);
        assert_eq!(json["onboarding"]["amount"], "2500");
        assert_eq!(json["sharePool"]["completed"], true);
        assert_eq!(json["sharePool"]["eligible"], true);
        assert!(json["campaign"].is_null());
    }

    #[test]
    fn recent_payout_is_not_yet_eligible() {
        let now = Utc::now();
        let rules = RewardRules::default();
        let recent = TasksResponse::new(&onboarded(), &summary(Some(now - week() / 2)), None, &rules, now);
        assert!(!recent.share_pool.eligible);

        let old = TasksResponse::new(&onboarded(), &summary(Some(now - week() * 2)), None, &rules, now);
        assert!(old.share_pool.eligible);
    }

    #[test]
    fn eligibility_counts_from_campaign_start() {
        let now = Utc::now();
        let campaign = Campaign {
            id: 1,
            start_time: now - week() / 7,
            end_time: now + week() * 4,
            is_active: true,
        };
        let view = TasksResponse::new(
            &onboarded(),
            &summary(None),
            Some(&campaign),
            &RewardRules::default(),
            now,
        );
        assert!(!view.share_pool.eligible);
        assert_eq!(view.campaign.map(|c| c.is_active), Some(true));
    }
}
