//! Process-local [`RewardsStore`].
//!
//! Used with `STORE_BACKEND=memory` and as the storage double in tests.
//! Each write operation holds the state lock for its whole duration and
//! validates before mutating, which gives it the same all-or-nothing
//! behavior as a database transaction.

use std::collections::{BTreeMap, HashMap, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;

use super::models::{
    SettlementOutcome, SettlementReport, SharePoolPlan, StoredSwap, SwapApplication, SwapReceipt,
    SwapSummary,
};
use super::store::RewardsStore;
use crate::domain::{
    Campaign, LeaderboardEntry, PointsHistoryEntry, PointsReason, RewardRules, User, ValuedSwap,
    WalletAddress,
};
use crate::error::RewardsError;

#[derive(Debug, Default)]
struct MemoryState {
    users: Vec<User>,
    user_index: HashMap<WalletAddress, usize>,
    swaps: Vec<StoredSwap>,
    swap_hashes: HashSet<String>,
    history: Vec<PointsHistoryEntry>,
    leaderboard: Vec<LeaderboardEntry>,
    leaderboard_index: HashMap<WalletAddress, usize>,
    campaigns: Vec<Campaign>,
    settlements: HashSet<(i64, u32)>,
}

impl MemoryState {
    fn resolve_user(&mut self, address: WalletAddress) -> usize {
        if let Some(idx) = self.user_index.get(&address) {
            return *idx;
        }
        let idx = self.users.len();
        self.users.push(User {
            id: i64::try_from(idx).unwrap_or(i64::MAX).saturating_add(1),
            address,
            onboarding_completed: false,
            onboarding_points: 0,
            total_points: 0,
        });
        self.user_index.insert(address, idx);
        idx
    }

    fn user_mut(&mut self, idx: usize) -> Result<&mut User, RewardsError> {
        self.users
            .get_mut(idx)
            .ok_or_else(|| RewardsError::Internal(format!("user slot {idx} missing")))
    }

    fn increment_leaderboard(&mut self, address: WalletAddress, delta: i64) {
        match self.leaderboard_index.get(&address) {
            Some(idx) => {
                if let Some(entry) = self.leaderboard.get_mut(*idx) {
                    entry.points = entry.points.saturating_add(delta);
                }
            }
            None => {
                self.leaderboard_index
                    .insert(address, self.leaderboard.len());
                self.leaderboard.push(LeaderboardEntry {
                    address,
                    points: delta,
                });
            }
        }
    }

    fn credit(
        &mut self,
        idx: usize,
        points: i64,
        reason: PointsReason,
        at: DateTime<Utc>,
    ) -> Result<i64, RewardsError> {
        let user = self.user_mut(idx)?;
        user.total_points = user.total_points.saturating_add(points);
        let (address, total) = (user.address, user.total_points);
        self.history.push(PointsHistoryEntry {
            address,
            points,
            reason,
            timestamp: at,
        });
        self.increment_leaderboard(address, points);
        Ok(total)
    }

    fn user_id(&self, idx: usize) -> i64 {
        self.users.get(idx).map_or(0, |u| u.id)
    }
}

/// In-memory rewards store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardsStore for MemoryStore {
    async fn apply_swap(
        &self,
        swap: &ValuedSwap,
        rules: &RewardRules,
    ) -> Result<SwapApplication, RewardsError> {
        let mut state = self.state.lock().await;
        let tx_hash = swap.log.tx_hash_hex();
        if state.swap_hashes.contains(&tx_hash) {
            return Ok(SwapApplication::Duplicate);
        }

        let idx = state.resolve_user(swap.sender());
        let stored = StoredSwap::new(state.user_id(idx), swap);
        state.swaps.push(stored);
        state.swap_hashes.insert(tx_hash);

        let onboarded = state.user_mut(idx)?.onboarding_completed;
        let award = rules.award_for_swap(swap.usd_value, onboarded);
        if let Some(bonus) = award.onboarding_bonus {
            let user = state.user_mut(idx)?;
            user.onboarding_completed = true;
            user.onboarding_points = bonus;
            state.credit(idx, bonus, PointsReason::Onboarding, swap.timestamp)?;
        }
        let total_points = state.credit(idx, award.swap_points, PointsReason::Swap, swap.timestamp)?;

        Ok(SwapApplication::Applied(SwapReceipt {
            user_id: state.user_id(idx),
            address: swap.sender(),
            award,
            total_points,
        }))
    }

    async fn settle_share_pool(
        &self,
        plan: &SharePoolPlan,
        rules: &RewardRules,
    ) -> Result<SettlementOutcome, RewardsError> {
        let mut state = self.state.lock().await;
        if state.settlements.contains(&(plan.campaign_id, plan.week)) {
            return Ok(SettlementOutcome::AlreadySettled);
        }

        // Keyed by user id so equal volumes keep storage order.
        let mut volumes: BTreeMap<i64, Decimal> = BTreeMap::new();
        for swap in state
            .swaps
            .iter()
            .filter(|s| plan.window_start <= s.block_time && s.block_time < plan.window_end)
        {
            let entry = volumes.entry(swap.user_id).or_default();
            *entry = entry.saturating_add(swap.usd_value);
        }
        let eligible: Vec<(usize, Decimal)> = volumes
            .into_iter()
            .filter_map(|(user_id, volume)| {
                let idx = usize::try_from(user_id.saturating_sub(1)).ok()?;
                let onboarded = state.users.get(idx)?.onboarding_completed;
                onboarded.then_some((idx, volume))
            })
            .collect();
        let total_volume = eligible
            .iter()
            .fold(Decimal::ZERO, |acc, (_, v)| acc.saturating_add(*v));

        let mut awards = Vec::new();
        for (idx, points) in rules.allocate_share_pool(&eligible) {
            state.credit(idx, points, PointsReason::WeeklySharePool, plan.settled_at)?;
            if let Some(user) = state.users.get(idx) {
                awards.push((user.address, points));
            }
        }

        state.settlements.insert((plan.campaign_id, plan.week));
        let mut campaign_ended = false;
        if plan.end_campaign {
            if let Some(campaign) = state
                .campaigns
                .iter_mut()
                .find(|c| c.id == plan.campaign_id)
            {
                campaign.is_active = false;
                campaign_ended = true;
            }
        }

        Ok(SettlementOutcome::Settled(SettlementReport {
            week: plan.week,
            total_volume,
            awards,
            campaign_ended,
        }))
    }

    async fn leaderboard_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RewardsError> {
        let state = self.state.lock().await;
        let mut ranked = state.leaderboard.clone();
        ranked.sort_by(|a, b| b.points.cmp(&a.points));
        ranked.truncate(limit);
        Ok(ranked)
    }

    async fn user(&self, address: WalletAddress) -> Result<Option<User>, RewardsError> {
        let state = self.state.lock().await;
        Ok(state
            .user_index
            .get(&address)
            .and_then(|idx| state.users.get(*idx))
            .cloned())
    }

    async fn points_history(
        &self,
        address: WalletAddress,
    ) -> Result<Vec<PointsHistoryEntry>, RewardsError> {
        let state = self.state.lock().await;
        let mut rows: Vec<PointsHistoryEntry> = state
            .history
            .iter()
            .filter(|h| h.address == address)
            .cloned()
            .collect();
        rows.reverse();
        rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(rows)
    }

    async fn swap_summary(&self, address: WalletAddress) -> Result<SwapSummary, RewardsError> {
        let state = self.state.lock().await;
        let Some(user) = state
            .user_index
            .get(&address)
            .and_then(|idx| state.users.get(*idx))
        else {
            return Ok(SwapSummary::default());
        };

        let mut summary = SwapSummary::default();
        for swap in state.swaps.iter().filter(|s| s.user_id == user.id) {
            summary.swap_count += 1;
            summary.total_volume = summary.total_volume.saturating_add(swap.usd_value);
        }
        for row in state
            .history
            .iter()
            .filter(|h| h.address == address && h.reason == PointsReason::WeeklySharePool)
        {
            summary.share_pool_points = summary.share_pool_points.saturating_add(row.points);
            summary.last_share_pool_at = summary.last_share_pool_at.max(Some(row.timestamp));
        }
        Ok(summary)
    }

    async fn latest_campaign(&self) -> Result<Option<Campaign>, RewardsError> {
        Ok(self.state.lock().await.campaigns.last().cloned())
    }

    async fn start_campaign(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Campaign, RewardsError> {
        let mut state = self.state.lock().await;
        let campaign = Campaign {
            id: i64::try_from(state.campaigns.len())
                .unwrap_or(i64::MAX)
                .saturating_add(1),
            start_time,
            end_time,
            is_active: true,
        };
        state.campaigns.push(campaign.clone());
        Ok(campaign)
    }

    async fn last_settled_week(&self, campaign_id: i64) -> Result<u32, RewardsError> {
        let state = self.state.lock().await;
        Ok(state
            .settlements
            .iter()
            .filter(|(id, _)| *id == campaign_id)
            .map(|(_, week)| *week)
            .max()
            .unwrap_or(0))
    }
}
