//! JSON-RPC chain client backed by an alloy HTTP provider.

use std::fmt;
use std::time::Duration;

use alloy::primitives::{Address, B256, Bytes};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{BlockId, Filter, TransactionInput, TransactionRequest};
use async_trait::async_trait;

use super::client::{ChainClient, RawLog};
use crate::error::RewardsError;

/// [`ChainClient`] over `eth_blockNumber`, `eth_getLogs` and `eth_call`.
///
/// Every request is bounded by `timeout`; an elapsed deadline is reported
/// as a transient [`RewardsError::Chain`].
pub struct RpcChainClient {
    provider: DynProvider,
    timeout: Duration,
}

impl RpcChainClient {
    /// Connects to the node at `rpc_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Chain`] if the URL is not a supported
    /// transport or the connection cannot be established.
    pub async fn connect(rpc_url: &str, timeout: Duration) -> Result<Self, RewardsError> {
        let provider = ProviderBuilder::new()
            .connect(rpc_url)
            .await
            .map_err(|e| RewardsError::Chain(format!("connect {rpc_url}: {e}")))?
            .erased();
        tracing::info!(timeout_secs = timeout.as_secs(), "connected to chain rpc");
        Ok(Self { provider, timeout })
    }

    async fn bounded<T, E, F>(&self, op: &'static str, fut: F) -> Result<T, RewardsError>
    where
        F: Future<Output = Result<T, E>>,
        E: fmt::Display,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(RewardsError::Chain(format!("{op}: {e}"))),
            Err(_) => Err(RewardsError::Chain(format!(
                "{op}: timed out after {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

impl fmt::Debug for RpcChainClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RpcChainClient")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChainClient for RpcChainClient {
    async fn latest_block(&self) -> Result<u64, RewardsError> {
        self.bounded("eth_blockNumber", self.provider.get_block_number())
            .await
    }

    async fn filter_logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RewardsError> {
        let filter = Filter::new()
            .address(address)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);
        let logs = self
            .bounded("eth_getLogs", self.provider.get_logs(&filter))
            .await?;

        let fetched = logs.len();
        let raw: Vec<RawLog> = logs
            .into_iter()
            .filter(|log| !log.removed)
            .filter_map(|log| {
                Some(RawLog {
                    address: log.inner.address,
                    topics: log.inner.data.topics().to_vec(),
                    data: log.inner.data.data.clone(),
                    tx_hash: log.transaction_hash?,
                    block_number: log.block_number?,
                    block_timestamp: log.block_timestamp,
                })
            })
            .collect();
        if raw.len() != fetched {
            tracing::debug!(
                fetched,
                kept = raw.len(),
                "dropped pending or removed logs"
            );
        }
        Ok(raw)
    }

    async fn call(
        &self,
        to: Address,
        data: Bytes,
        block_number: u64,
    ) -> Result<Bytes, RewardsError> {
        let request = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(data));
        self.bounded(
            "eth_call",
            self.provider
                .call(request)
                .block(BlockId::number(block_number))
                .into_future(),
        )
        .await
    }
}
