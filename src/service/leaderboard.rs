//! Ranked read view over the leaderboard aggregate.
//!
//! Increments happen inside the store's write transactions; this type
//! only reads the standings back and pushes them to subscribers.

use crate::domain::LeaderboardEntry;
use crate::error::RewardsError;
use crate::persistence::StoreObj;
use crate::ws::{Broadcaster, OutboundMessage};

/// Leaderboard reader.
#[derive(Debug, Clone)]
pub struct Leaderboard {
    store: StoreObj,
    broadcast_limit: usize,
}

impl Leaderboard {
    /// Creates a reader that pushes the top `broadcast_limit` rows with
    /// each update.
    #[must_use]
    pub const fn new(store: StoreObj, broadcast_limit: usize) -> Self {
        Self {
            store,
            broadcast_limit,
        }
    }

    /// Top `limit` entries, points descending, ties in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Persistence`] on storage failure.
    pub async fn top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RewardsError> {
        self.store.leaderboard_top(limit).await
    }

    /// Reads the current standings and publishes a `leaderboard_update`.
    ///
    /// Read failures are logged; the notification is best effort.
    pub async fn publish(&self, broadcaster: &Broadcaster) {
        match self.top(self.broadcast_limit).await {
            Ok(leaderboard) => {
                broadcaster
                    .publish(&OutboundMessage::LeaderboardUpdate { leaderboard })
                    .await;
            }
            Err(e) => tracing::warn!(error = %e, "leaderboard read-back failed"),
        }
    }
}
