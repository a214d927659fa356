//! The storage capability used by the ledger, leaderboard and distributor.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::models::{SettlementOutcome, SharePoolPlan, SwapApplication, SwapSummary};
use crate::domain::{
    Campaign, LeaderboardEntry, PointsHistoryEntry, RewardRules, User, ValuedSwap, WalletAddress,
};
use crate::error::RewardsError;

/// Shared handle to a store.
pub type StoreObj = Arc<dyn RewardsStore>;

/// Durable rewards state.
///
/// The two write operations are all-or-nothing: either every row they touch
/// is committed or none is. Implementations compute points with
/// [`RewardRules`] against the state read inside the same transaction.
#[async_trait]
pub trait RewardsStore: Send + Sync + fmt::Debug {
    /// Records a valued swap and its points, keyed by transaction hash.
    ///
    /// Resolves or creates the sender's user, inserts the swap, applies the
    /// onboarding bonus if due, appends the swap points and increments the
    /// user total and leaderboard entry. A transaction hash that is already
    /// recorded yields [`SwapApplication::Duplicate`] and changes nothing.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure; nothing is written.
    async fn apply_swap(
        &self,
        swap: &ValuedSwap,
        rules: &RewardRules,
    ) -> Result<SwapApplication, RewardsError>;

    /// Pays out one week of the share pool exactly once.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure; nothing is written.
    async fn settle_share_pool(
        &self,
        plan: &SharePoolPlan,
        rules: &RewardRules,
    ) -> Result<SettlementOutcome, RewardsError>;

    /// Top `limit` standings by points, ties in insertion order.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn leaderboard_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RewardsError>;

    /// Looks up a user by wallet.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn user(&self, address: WalletAddress) -> Result<Option<User>, RewardsError>;

    /// A user's points rows, newest first.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn points_history(
        &self,
        address: WalletAddress,
    ) -> Result<Vec<PointsHistoryEntry>, RewardsError>;

    /// Swap and share-pool aggregates for a user.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn swap_summary(&self, address: WalletAddress) -> Result<SwapSummary, RewardsError>;

    /// Most recently created campaign, active or not.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn latest_campaign(&self) -> Result<Option<Campaign>, RewardsError>;

    /// Inserts a new active campaign row.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn start_campaign(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Campaign, RewardsError>;

    /// Highest settled week of a campaign, 0 when none.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Persistence`] on storage failure.
    async fn last_settled_week(&self, campaign_id: i64) -> Result<u32, RewardsError>;
}
