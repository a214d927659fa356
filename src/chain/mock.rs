//! Scripted chain and price doubles for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, B256, Bytes, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

use super::client::{ChainClient, RawLog};
use super::decoder::SWAP_EVENT_TOPIC;
use super::valuation::PriceSource;
use crate::error::RewardsError;

/// In-memory chain whose head, logs and call responses are set by the test.
#[derive(Debug, Default)]
pub(crate) struct MockChain {
    head: Mutex<u64>,
    logs: Mutex<Vec<RawLog>>,
    responses: Mutex<HashMap<Address, Bytes>>,
    queries: Mutex<Vec<(u64, u64)>>,
    pub(crate) fail_logs: AtomicBool,
    pub(crate) calls: AtomicUsize,
}

impl MockChain {
    pub(crate) fn new(head: u64) -> Arc<Self> {
        let chain = Self::default();
        *chain.head.lock().unwrap_or_else(PoisonError::into_inner) = head;
        Arc::new(chain)
    }

    pub(crate) fn set_head(&self, head: u64) {
        *self.head.lock().unwrap_or_else(PoisonError::into_inner) = head;
    }

    pub(crate) fn push_log(&self, log: RawLog) {
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(log);
    }

    pub(crate) fn set_call_response(&self, to: Address, data: Vec<u8>) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(to, Bytes::from(data));
    }

    /// Ranges passed to `filter_logs`, in call order.
    pub(crate) fn queries(&self) -> Vec<(u64, u64)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn latest_block(&self) -> Result<u64, RewardsError> {
        Ok(*self.head.lock().unwrap_or_else(PoisonError::into_inner))
    }

    async fn filter_logs(
        &self,
        address: Address,
        topic: B256,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RewardsError> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((from_block, to_block));
        if self.fail_logs.load(Ordering::SeqCst) {
            return Err(RewardsError::Chain("eth_getLogs: connection reset".to_string()));
        }
        let logs = self.logs.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(logs
            .iter()
            .filter(|log| {
                log.address == address
                    && log.topics.first() == Some(&topic)
                    && (from_block..=to_block).contains(&log.block_number)
            })
            .cloned()
            .collect())
    }

    async fn call(
        &self,
        to: Address,
        _data: Bytes,
        _block_number: u64,
    ) -> Result<Bytes, RewardsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .cloned()
            .ok_or_else(|| RewardsError::Chain(format!("eth_call: no code at {to:#x}")))
    }
}

/// Price source answering a constant.
#[derive(Debug)]
pub(crate) struct FixedPrice(pub(crate) Decimal);

#[async_trait]
impl PriceSource for FixedPrice {
    fn name(&self) -> &'static str {
        "fixed"
    }

    async fn price_at(&self, _block_number: u64) -> Result<Decimal, RewardsError> {
        Ok(self.0)
    }
}

/// A pool swap log paying `amount1_out` raw stablecoin units to `sender`.
pub(crate) fn stable_swap_log(
    pool: Address,
    sender: Address,
    amount1_out: u64,
    tx_byte: u8,
    block_number: u64,
) -> RawLog {
    let data = [
        U256::ZERO.to_be_bytes::<32>(),
        U256::ZERO.to_be_bytes::<32>(),
        U256::ZERO.to_be_bytes::<32>(),
        U256::from(amount1_out).to_be_bytes::<32>(),
    ]
    .concat();
    RawLog {
        address: pool,
        topics: vec![SWAP_EVENT_TOPIC, sender.into_word(), sender.into_word()],
        data: Bytes::from(data),
        tx_hash: B256::repeat_byte(tx_byte),
        block_number,
        block_timestamp: None,
    }
}
