//! Block-range poller driving swap ingestion.
//!
//! A single loop owns the block cursor. Each tick reads the chain head,
//! fetches the pool's swap logs for the unprocessed range, values them and
//! hands them to the [`RewardsLedger`]. The cursor only moves once the
//! whole batch has been handed off, so a failed tick is retried from the
//! same block on the next one; the ledger's transaction-hash idempotency
//! absorbs the replay.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::client::{ChainClientObj, RawLog};
use super::decoder::{SWAP_EVENT_TOPIC, decode_swap_log};
use super::valuation::Valuator;
use crate::domain::ValuedSwap;
use crate::error::RewardsError;
use crate::persistence::SwapApplication;
use crate::service::RewardsLedger;

/// Poller timing and range limits.
#[derive(Debug, Clone, Copy)]
pub struct PollerSettings {
    /// Pool contract emitting the swap logs.
    pub pool_address: Address,
    /// Time between ticks.
    pub interval: Duration,
    /// Blocks behind head to start from on the first tick.
    pub lookback_blocks: u64,
    /// Largest block range fetched per tick; 0 means unlimited.
    pub max_block_range: u64,
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Head has not moved past the cursor.
    Idle {
        /// Chain head at the time of the tick.
        latest: u64,
    },
    /// A block range was processed and the cursor advanced.
    Processed(BatchReport),
}

/// Per-batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// First block of the range (inclusive).
    pub from_block: u64,
    /// Last block of the range (inclusive); the new cursor.
    pub to_block: u64,
    /// Logs returned by the node.
    pub logs: usize,
    /// Swaps newly recorded.
    pub recorded: usize,
    /// Swaps already recorded by an earlier attempt.
    pub duplicates: usize,
    /// Logs that failed decoding or valuation.
    pub skipped: usize,
}

/// Drives the ingestion pipeline.
#[derive(Debug)]
pub struct Poller {
    chain: ChainClientObj,
    valuator: Valuator,
    ledger: Arc<RewardsLedger>,
    settings: PollerSettings,
    cursor: Option<u64>,
}

impl Poller {
    /// Creates a poller; the cursor is initialized on the first tick.
    #[must_use]
    pub const fn new(
        chain: ChainClientObj,
        valuator: Valuator,
        ledger: Arc<RewardsLedger>,
        settings: PollerSettings,
    ) -> Self {
        Self {
            chain,
            valuator,
            ledger,
            settings,
            cursor: None,
        }
    }

    /// Last fully processed block, once known.
    #[must_use]
    pub const fn cursor(&self) -> Option<u64> {
        self.cursor
    }

    /// Runs one poll cycle.
    ///
    /// # Errors
    ///
    /// Returns the first transient error (chain or storage). The cursor is
    /// left where it was so the same range is fetched again next time.
    pub async fn tick(&mut self) -> Result<TickOutcome, RewardsError> {
        let latest = self.chain.latest_block().await?;
        let cursor = *self
            .cursor
            .get_or_insert_with(|| latest.saturating_sub(self.settings.lookback_blocks));
        if latest <= cursor {
            return Ok(TickOutcome::Idle { latest });
        }

        let from_block = cursor.saturating_add(1);
        let to_block = match self.settings.max_block_range {
            0 => latest,
            range => latest.min(cursor.saturating_add(range)),
        };
        let logs = self
            .chain
            .filter_logs(
                self.settings.pool_address,
                SWAP_EVENT_TOPIC,
                from_block,
                to_block,
            )
            .await?;

        let mut report = BatchReport {
            from_block,
            to_block,
            logs: logs.len(),
            ..BatchReport::default()
        };
        for log in &logs {
            self.process_log(log, &mut report).await?;
        }
        self.cursor = Some(to_block);
        Ok(TickOutcome::Processed(report))
    }

    async fn process_log(
        &mut self,
        log: &RawLog,
        report: &mut BatchReport,
    ) -> Result<(), RewardsError> {
        let tx_hash = log.tx_hash;
        let swap = match decode_swap_log(log) {
            Ok(swap) => swap,
            Err(e) => {
                tracing::warn!(%tx_hash, block = log.block_number, error = %e, "skipping undecodable log");
                report.skipped += 1;
                return Ok(());
            }
        };
        let usd_value = match self.valuator.value(&swap).await {
            Ok(v) => v,
            Err(e) if e.is_skippable() => {
                tracing::warn!(%tx_hash, block = swap.block_number, error = %e, "skipping unvaluable swap");
                report.skipped += 1;
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let valued = ValuedSwap::new(swap, usd_value, Utc::now());
        match self.ledger.record_swap(&valued).await? {
            SwapApplication::Applied(_) => report.recorded += 1,
            SwapApplication::Duplicate => report.duplicates += 1,
        }
        Ok(())
    }

    /// Ticks on the configured interval until `shutdown` is cancelled.
    ///
    /// Cancellation is only observed between ticks, so an in-flight ledger
    /// transaction always completes.
    pub async fn run(mut self, shutdown: CancellationToken) {
        tracing::info!(
            pool = %self.settings.pool_address,
            interval_secs = self.settings.interval.as_secs(),
            lookback = self.settings.lookback_blocks,
            "poller started"
        );
        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {}
            }
            match self.tick().await {
                Ok(TickOutcome::Idle { latest }) => {
                    tracing::debug!(latest, cursor = ?self.cursor, "no new blocks");
                }
                Ok(TickOutcome::Processed(report)) => {
                    tracing::info!(
                        from = report.from_block,
                        to = report.to_block,
                        logs = report.logs,
                        recorded = report.recorded,
                        duplicates = report.duplicates,
                        skipped = report.skipped,
                        "processed block range"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, cursor = ?self.cursor, "poll tick failed, retrying next tick");
                }
            }
        }
        tracing::info!(cursor = ?self.cursor, "poller stopped");
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::mock::{FixedPrice, MockChain, stable_swap_log};
    use crate::config::DEFAULT_POOL_ADDRESS;
    use crate::domain::{RewardRules, WalletAddress};
    use crate::persistence::{MemoryStore, RewardsStore, StoreObj};
    use crate::service::Leaderboard;
    use crate::ws::{Broadcaster, BroadcasterSettings};
    use alloy::primitives::Bytes;
    use rust_decimal::Decimal;
    use std::sync::atomic::Ordering;

    struct Harness {
        chain: Arc<MockChain>,
        store: StoreObj,
        poller: Poller,
    }

    fn harness(head: u64, max_block_range: u64) -> Harness {
        let chain = MockChain::new(head);
        let store: StoreObj = Arc::new(MemoryStore::new());
        let (broadcaster, _dispatch) = Broadcaster::start(BroadcasterSettings::default());
        let leaderboard = Leaderboard::new(Arc::clone(&store), 10);
        let ledger = Arc::new(RewardsLedger::new(
            Arc::clone(&store),
            leaderboard,
            broadcaster,
            RewardRules::default(),
        ));
        let valuator = Valuator::new(Arc::new(FixedPrice(Decimal::from(2_000))), 18, 6);
        let settings = PollerSettings {
            pool_address: DEFAULT_POOL_ADDRESS,
            interval: Duration::from_secs(15),
            lookback_blocks: 100,
            max_block_range,
        };
        let poller = Poller::new(Arc::clone(&chain) as ChainClientObj, valuator, ledger, settings);
        Harness {
            chain,
            store,
            poller,
        }
    }

    fn sender() -> Address {
        Address::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn first_tick_starts_at_lookback_window() {
        let mut h = harness(1_000, 0);
        let Ok(TickOutcome::Processed(report)) = h.poller.tick().await else {
            panic!("expected a processed batch");
        };
        assert_eq!((report.from_block, report.to_block), (901, 1_000));
        assert_eq!(h.poller.cursor(), Some(1_000));

        let Ok(TickOutcome::Idle { latest }) = h.poller.tick().await else {
            panic!("head has not moved");
        };
        assert_eq!(latest, 1_000);
    }

    #[tokio::test]
    async fn failed_fetch_does_not_advance_cursor() {
        let mut h = harness(1_000, 0);
        let _ = h.poller.tick().await;
        h.chain.set_head(1_010);
        h.chain.fail_logs.store(true, Ordering::SeqCst);
        assert!(h.poller.tick().await.is_err());
        assert_eq!(h.poller.cursor(), Some(1_000));

        h.chain.fail_logs.store(false, Ordering::SeqCst);
        let Ok(TickOutcome::Processed(report)) = h.poller.tick().await else {
            panic!("retry should succeed");
        };
        assert_eq!((report.from_block, report.to_block), (1_001, 1_010));
        assert_eq!(h.chain.queries().last(), Some(&(1_001, 1_010)));
    }

    #[tokio::test]
    async fn records_swaps_and_skips_malformed_logs() {
        let mut h = harness(1_000, 0);
        h.chain
            .push_log(stable_swap_log(DEFAULT_POOL_ADDRESS, sender(), 1_500_000_000, 1, 950));
        let mut broken = stable_swap_log(DEFAULT_POOL_ADDRESS, sender(), 1, 2, 951);
        broken.data = Bytes::from(vec![0u8; 96]);
        h.chain.push_log(broken);
        h.chain
            .push_log(stable_swap_log(DEFAULT_POOL_ADDRESS, sender(), 0, 3, 952));

        let Ok(TickOutcome::Processed(report)) = h.poller.tick().await else {
            panic!("batch processed");
        };
        assert_eq!(report.logs, 3);
        assert_eq!(report.recorded, 1);
        assert_eq!(report.skipped, 2);

        let Ok(Some(user)) = h.store.user(WalletAddress::new(sender())).await else {
            panic!("user created");
        };
        assert_eq!(user.total_points, 250);
    }

    #[tokio::test]
    async fn replayed_range_is_not_double_counted() {
        let mut h = harness(1_000, 0);
        h.chain
            .push_log(stable_swap_log(DEFAULT_POOL_ADDRESS, sender(), 50_000_000, 7, 990));
        let _ = h.poller.tick().await;

        // A fresh poller re-reads the same lookback window.
        let mut again = Poller::new(
            Arc::clone(&h.chain) as ChainClientObj,
            Valuator::new(Arc::new(FixedPrice(Decimal::from(2_000))), 18, 6),
            Arc::clone(&h.poller.ledger),
            h.poller.settings,
        );
        let Ok(TickOutcome::Processed(report)) = again.tick().await else {
            panic!("batch processed");
        };
        assert_eq!(report.duplicates, 1);
        assert_eq!(report.recorded, 0);

        let Ok(Some(user)) = h.store.user(WalletAddress::new(sender())).await else {
            panic!("user created");
        };
        assert_eq!(user.total_points, 5);

        let Ok(summary) = h.store.swap_summary(WalletAddress::new(sender())).await else {
            panic!("summary readable");
        };
        assert_eq!(summary.swap_count, 1);
    }

    #[tokio::test]
    async fn large_gaps_are_chunked() {
        let mut h = harness(10_000, 2_000);
        h.poller.cursor = Some(5_000);
        let Ok(TickOutcome::Processed(first)) = h.poller.tick().await else {
            panic!("first chunk");
        };
        assert_eq!((first.from_block, first.to_block), (5_001, 7_000));
        let Ok(TickOutcome::Processed(second)) = h.poller.tick().await else {
            panic!("second chunk");
        };
        assert_eq!((second.from_block, second.to_block), (7_001, 9_000));
    }
}
