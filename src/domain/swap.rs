//! Decoded swap events as they move from the chain into the ledger.

use alloy::primitives::{B256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use super::WalletAddress;

/// The four raw token amounts of a pool swap, in the order the pool emits
/// them. Token0 is the volatile asset, token1 the stablecoin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwapAmounts {
    /// Token0 paid into the pool.
    pub amount0_in: U256,
    /// Token1 paid into the pool.
    pub amount1_in: U256,
    /// Token0 paid out of the pool.
    pub amount0_out: U256,
    /// Token1 paid out of the pool.
    pub amount1_out: U256,
}

impl SwapAmounts {
    /// Returns `true` when no amount moved in either direction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.amount0_in.is_zero()
            && self.amount1_in.is_zero()
            && self.amount0_out.is_zero()
            && self.amount1_out.is_zero()
    }
}

/// A swap log decoded from the pool, before valuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLog {
    /// Transaction that emitted the log; the ledger's idempotency key.
    pub tx_hash: B256,
    /// Block the log was mined in.
    pub block_number: u64,
    /// Block timestamp when the node reported one.
    pub block_time: Option<DateTime<Utc>>,
    /// Indexed `sender` topic.
    pub sender: WalletAddress,
    /// Indexed `to` topic.
    pub recipient: WalletAddress,
    /// Raw token amounts.
    pub amounts: SwapAmounts,
}

impl SwapLog {
    /// Lowercase `0x`-prefixed transaction hash, as stored.
    #[must_use]
    pub fn tx_hash_hex(&self) -> String {
        format!("{:#x}", self.tx_hash)
    }
}

/// A swap with its USD value, ready to be recorded by the ledger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValuedSwap {
    /// The decoded log.
    pub log: SwapLog,
    /// Absolute USD value of the trade.
    pub usd_value: Decimal,
    /// Timestamp the swap is filed under (block time, else processing time).
    pub timestamp: DateTime<Utc>,
}

impl ValuedSwap {
    /// Attaches a USD value to a decoded log.
    ///
    /// The timestamp is the block time when known, otherwise `fallback`.
    #[must_use]
    pub fn new(log: SwapLog, usd_value: Decimal, fallback: DateTime<Utc>) -> Self {
        let timestamp = log.block_time.unwrap_or(fallback);
        Self {
            log,
            usd_value: usd_value.abs(),
            timestamp,
        }
    }

    /// The wallet that initiated the trade.
    #[must_use]
    pub const fn sender(&self) -> WalletAddress {
        self.log.sender
    }
}
