//! Rewards ledger: records valued swaps and notifies subscribers.

use crate::domain::{RewardRules, ValuedSwap};
use crate::error::RewardsError;
use crate::persistence::{StoreObj, SwapApplication};
use crate::service::Leaderboard;
use crate::ws::{Broadcaster, OutboundMessage, SwapEventPayload};

/// Turns a valued swap into durable points.
///
/// The store applies the whole swap in one transaction keyed by
/// transaction hash. Notifications go out only after that commit and
/// never affect the result.
#[derive(Debug)]
pub struct RewardsLedger {
    store: StoreObj,
    leaderboard: Leaderboard,
    broadcaster: Broadcaster,
    rules: RewardRules,
}

impl RewardsLedger {
    /// Creates a ledger.
    #[must_use]
    pub const fn new(
        store: StoreObj,
        leaderboard: Leaderboard,
        broadcaster: Broadcaster,
        rules: RewardRules,
    ) -> Self {
        Self {
            store,
            leaderboard,
            broadcaster,
            rules,
        }
    }

    /// Reward parameters in force.
    #[must_use]
    pub const fn rules(&self) -> &RewardRules {
        &self.rules
    }

    /// Records `swap` exactly once.
    ///
    /// On first application this publishes the `swap_event`, the sender's
    /// `user_points_update` and a fresh `leaderboard_update`.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Persistence`] if the transaction failed, in
    /// which case nothing was recorded.
    pub async fn record_swap(&self, swap: &ValuedSwap) -> Result<SwapApplication, RewardsError> {
        let tx_hash = swap.log.tx_hash_hex();
        let outcome = self.store.apply_swap(swap, &self.rules).await?;
        let receipt = match &outcome {
            SwapApplication::Applied(receipt) => receipt,
            SwapApplication::Duplicate => {
                tracing::debug!(%tx_hash, "swap already recorded");
                return Ok(outcome);
            }
        };

        tracing::info!(
            %tx_hash,
            address = %receipt.address,
            usd = %swap.usd_value,
            points = receipt.award.total(),
            onboarding = receipt.award.onboarding_bonus.is_some(),
            total = receipt.total_points,
            "swap recorded"
        );

        self.broadcaster
            .publish(&OutboundMessage::SwapEvent {
                event: SwapEventPayload::new(swap, receipt.award.total()),
            })
            .await;
        self.broadcaster
            .publish(&OutboundMessage::UserPointsUpdate {
                address: receipt.address,
                points: receipt.total_points,
            })
            .await;
        self.leaderboard.publish(&self.broadcaster).await;

        Ok(outcome)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{SwapAmounts, SwapLog, WalletAddress};
    use crate::persistence::MemoryStore;
    use crate::ws::{BroadcasterSettings, ClientHandle, Topic};
    use alloy::primitives::{Address, B256};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::Arc;
    use std::time::Duration;

    fn valued(tx: u8, usd: i64) -> ValuedSwap {
        let log = SwapLog {
            tx_hash: B256::repeat_byte(tx),
            block_number: 10,
            block_time: None,
            sender: WalletAddress::new(Address::repeat_byte(0xaa)),
            recipient: WalletAddress::new(Address::repeat_byte(0xbb)),
            amounts: SwapAmounts::default(),
        };
        ValuedSwap::new(log, Decimal::from(usd), Utc::now())
    }

    async fn kinds(client: &mut ClientHandle) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(Some(payload)) =
            tokio::time::timeout(Duration::from_millis(100), client.outbound.recv()).await
        {
            if let Some(kind) = serde_json::from_str::<serde_json::Value>(&payload)
                .ok()
                .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_string))
            {
                out.push(kind);
            }
        }
        out
    }

    #[tokio::test]
    async fn commit_then_notify_once() {
        let store: StoreObj = Arc::new(MemoryStore::new());
        let (broadcaster, _task) = Broadcaster::start(BroadcasterSettings::default());
        let Ok(mut client) = broadcaster.register().await else {
            panic!("register");
        };
        client.subscribe(Topic::SwapEvents);
        client.subscribe(Topic::Leaderboard);

        let ledger = RewardsLedger::new(
            Arc::clone(&store),
            Leaderboard::new(Arc::clone(&store), 10),
            broadcaster.clone(),
            RewardRules::default(),
        );

        let swap = valued(1, 1_500);
        let Ok(SwapApplication::Applied(receipt)) = ledger.record_swap(&swap).await else {
            panic!("applied");
        };
        assert_eq!(receipt.total_points, 250);
        assert_eq!(
            kinds(&mut client).await,
            vec!["swap_event", "user_points_update", "leaderboard_update"]
        );

        assert!(matches!(ledger.record_swap(&swap).await, Ok(SwapApplication::Duplicate)));
        assert!(kinds(&mut client).await.is_empty());
    }
}
