//! Weekly share-pool distributor.
//!
//! Week `k` of a campaign closes at `start + 7k days` (clamped to the
//! campaign end). Once a week has closed, its pool is split pro-rata over
//! the window's onboarded volume and the payout is committed in one store
//! transaction together with a settlement record, so each week is paid out
//! exactly once no matter how often the check runs. Settling the week that
//! reaches the end time also deactivates the campaign.

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::campaign::CampaignManager;
use super::leaderboard::Leaderboard;
use crate::domain::{Campaign, RewardRules};
use crate::error::RewardsError;
use crate::persistence::{SettlementOutcome, SettlementReport, SharePoolPlan, StoreObj};
use crate::ws::Broadcaster;

/// Result of one distribution check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionOutcome {
    /// No campaign has ever been started.
    NoCampaign,
    /// The latest campaign has ended.
    Inactive {
        /// Campaign id.
        campaign_id: i64,
    },
    /// The next week has not closed yet.
    NotDue {
        /// Week waiting to close.
        week: u32,
        /// When it closes.
        due_at: DateTime<Utc>,
    },
    /// A concurrent run settled the week first.
    AlreadySettled {
        /// Week number.
        week: u32,
    },
    /// This run paid out a week.
    Settled(SettlementReport),
}

/// Runs the weekly share-pool payout.
#[derive(Debug)]
pub struct WeeklyDistributor {
    store: StoreObj,
    leaderboard: Leaderboard,
    campaigns: CampaignManager,
    broadcaster: Broadcaster,
    rules: RewardRules,
    check_interval: Duration,
}

impl WeeklyDistributor {
    /// Creates a distributor checking every `check_interval`.
    #[must_use]
    pub const fn new(
        store: StoreObj,
        leaderboard: Leaderboard,
        campaigns: CampaignManager,
        broadcaster: Broadcaster,
        rules: RewardRules,
        check_interval: Duration,
    ) -> Self {
        Self {
            store,
            leaderboard,
            campaigns,
            broadcaster,
            rules,
            check_interval,
        }
    }

    /// Settles the next closed week of the active campaign, if any.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Persistence`] on storage failure; nothing is
    /// paid out and the same week is retried on the next check.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<DistributionOutcome, RewardsError> {
        let Some(campaign) = self.store.latest_campaign().await? else {
            return Ok(DistributionOutcome::NoCampaign);
        };
        if !campaign.is_active {
            return Ok(DistributionOutcome::Inactive {
                campaign_id: campaign.id,
            });
        }

        let week = self.store.last_settled_week(campaign.id).await?.saturating_add(1);
        if week > campaign.total_weeks() {
            return Ok(DistributionOutcome::Inactive {
                campaign_id: campaign.id,
            });
        }
        let due_at = campaign.week_boundary(week);
        if due_at > now {
            return Ok(DistributionOutcome::NotDue { week, due_at });
        }

        let plan = self.plan(&campaign, week, now);
        match self.store.settle_share_pool(&plan, &self.rules).await? {
            SettlementOutcome::AlreadySettled => Ok(DistributionOutcome::AlreadySettled { week }),
            SettlementOutcome::Settled(report) => {
                self.after_settlement(&campaign, &report, now).await;
                Ok(DistributionOutcome::Settled(report))
            }
        }
    }

    /// Volume window for `week`: the trailing share-pool window ending at
    /// the week boundary, never reaching back into the previous week.
    fn plan(&self, campaign: &Campaign, week: u32, now: DateTime<Utc>) -> SharePoolPlan {
        let window_end = campaign.week_boundary(week);
        let previous = campaign.week_boundary(week.saturating_sub(1));
        let window_start = (window_end - self.rules.share_pool_window).max(previous);
        SharePoolPlan {
            campaign_id: campaign.id,
            week,
            window_start,
            window_end,
            end_campaign: window_end >= campaign.end_time,
            settled_at: now,
        }
    }

    async fn after_settlement(&self, campaign: &Campaign, report: &SettlementReport, now: DateTime<Utc>) {
        if report.awards.is_empty() {
            tracing::info!(campaign = campaign.id, week = report.week, "no eligible volume, week settled without payout");
        } else {
            tracing::info!(
                campaign = campaign.id,
                week = report.week,
                users = report.awards.len(),
                volume = %report.total_volume,
                points = report.distributed(),
                "weekly share pool distributed"
            );
            self.leaderboard.publish(&self.broadcaster).await;
        }

        if report.campaign_ended {
            tracing::info!(campaign = campaign.id, "campaign ended");
            let ended = Campaign {
                is_active: false,
                ..campaign.clone()
            };
            self.campaigns.announce(&ended, now).await;
        }
    }

    /// Checks on the configured interval until `shutdown` is cancelled,
    /// settling every week that has closed since the last check.
    pub async fn run(self, shutdown: CancellationToken) {
        tracing::info!(interval_secs = self.check_interval.as_secs(), "distributor started");
        let mut ticker = tokio::time::interval(self.check_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            loop {
                match self.run_cycle(Utc::now()).await {
                    Ok(DistributionOutcome::Settled(_)) => {}
                    Ok(DistributionOutcome::NotDue { week, due_at }) => {
                        tracing::debug!(week, %due_at, "next week not closed yet");
                        break;
                    }
                    Ok(other) => {
                        tracing::debug!(outcome = ?other, "nothing to distribute");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "distribution failed, retrying next check");
                        break;
                    }
                }
                if shutdown.is_cancelled() {
                    break;
                }
            }
        }
        tracing::info!("distributor stopped");
    }
}
