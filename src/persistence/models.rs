//! Storage models shared by every store implementation.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::{SwapAward, ValuedSwap, WalletAddress};

/// A `swap_events` row in its stored (text-normalized) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredSwap {
    /// Owning user row.
    pub user_id: i64,
    /// Lowercase `0x`-prefixed transaction hash; unique.
    pub transaction_hash: String,
    /// Lowercase sender address.
    pub sender: String,
    /// Lowercase recipient address.
    pub recipient: String,
    /// Raw token0 paid in, as decimal text.
    pub amount0_in: String,
    /// Raw token1 paid in, as decimal text.
    pub amount1_in: String,
    /// Raw token0 paid out, as decimal text.
    pub amount0_out: String,
    /// Raw token1 paid out, as decimal text.
    pub amount1_out: String,
    /// Absolute USD value.
    pub usd_value: Decimal,
    /// Block the swap was mined in.
    pub block_number: i64,
    /// Block time (or processing time when the node omitted it).
    pub block_time: DateTime<Utc>,
}

impl StoredSwap {
    /// Normalizes a valued swap for storage under `user_id`.
    #[must_use]
    pub fn new(user_id: i64, swap: &ValuedSwap) -> Self {
        let log = &swap.log;
        Self {
            user_id,
            transaction_hash: log.tx_hash_hex(),
            sender: log.sender.to_string(),
            recipient: log.recipient.to_string(),
            amount0_in: log.amounts.amount0_in.to_string(),
            amount1_in: log.amounts.amount1_in.to_string(),
            amount0_out: log.amounts.amount0_out.to_string(),
            amount1_out: log.amounts.amount1_out.to_string(),
            usd_value: swap.usd_value,
            block_number: i64::try_from(log.block_number).unwrap_or(i64::MAX),
            block_time: swap.timestamp,
        }
    }
}

/// Result of applying one swap to the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwapApplication {
    /// The swap was new and its points were committed.
    Applied(SwapReceipt),
    /// The transaction hash was already recorded; nothing changed.
    Duplicate,
}

/// Effects of a committed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapReceipt {
    /// User row the swap was filed under.
    pub user_id: i64,
    /// Wallet credited.
    pub address: WalletAddress,
    /// Points awarded by this swap.
    pub award: SwapAward,
    /// User total after the swap.
    pub total_points: i64,
}

/// One week of the share pool to settle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharePoolPlan {
    /// Campaign being paid out.
    pub campaign_id: i64,
    /// 1-based week number; unique per campaign.
    pub week: u32,
    /// Volume window start (inclusive).
    pub window_start: DateTime<Utc>,
    /// Volume window end (exclusive).
    pub window_end: DateTime<Utc>,
    /// Deactivate the campaign in the same transaction.
    pub end_campaign: bool,
    /// Timestamp written on the points rows and the settlement record.
    pub settled_at: DateTime<Utc>,
}

/// Outcome of a settlement attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettlementOutcome {
    /// This call paid out the week.
    Settled(SettlementReport),
    /// Another run already settled the week.
    AlreadySettled,
}

/// What a settlement paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementReport {
    /// Week settled.
    pub week: u32,
    /// Sum of eligible volume in the window.
    pub total_volume: Decimal,
    /// Points per wallet, in ranking order.
    pub awards: Vec<(WalletAddress, i64)>,
    /// Whether the campaign was deactivated.
    pub campaign_ended: bool,
}

impl SettlementReport {
    /// Points handed out by this settlement.
    #[must_use]
    pub fn distributed(&self) -> i64 {
        self.awards.iter().map(|(_, p)| *p).sum()
    }
}

/// Per-user aggregates for the task view.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SwapSummary {
    /// Number of recorded swaps.
    pub swap_count: i64,
    /// Lifetime USD volume.
    pub total_volume: Decimal,
    /// Points received from the share pool.
    pub share_pool_points: i64,
    /// When the user last received share-pool points.
    pub last_share_pool_at: Option<DateTime<Utc>>,
}
