//! The chain-client capability consumed by the poller and price sources.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, B256, Bytes};
use async_trait::async_trait;

use crate::error::RewardsError;

/// Shared handle to a chain client.
pub type ChainClientObj = Arc<dyn ChainClient>;

/// A mined log as returned by a log filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLog {
    /// Emitting contract.
    pub address: Address,
    /// Indexed topics; `topics[0]` is the event signature hash.
    pub topics: Vec<B256>,
    /// ABI-encoded non-indexed fields.
    pub data: Bytes,
    /// Transaction that emitted the log.
    pub tx_hash: B256,
    /// Block the log was mined in.
    pub block_number: u64,
    /// Block timestamp (seconds) when the node includes it.
    pub block_timestamp: Option<u64>,
}

/// Read-only access to an EVM chain.
///
/// Every method maps transport and node failures to
/// [`RewardsError::Chain`], which callers treat as transient.
#[async_trait]
pub trait ChainClient: Send + Sync + fmt::Debug {
    /// Current head block number.
    async fn latest_block(&self) -> Result<u64, RewardsError>;

    /// Logs emitted by `address` with `topic0 == topic`, over the inclusive
    /// block range `[from_block, to_block]`.
    async fn filter_logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RewardsError>;

    /// Executes a read-only contract call against the state at `block_number`.
    async fn call(
        &self,
        to: Address,
        data: Bytes,
        block_number: u64,
    ) -> Result<Bytes, RewardsError>;
}
