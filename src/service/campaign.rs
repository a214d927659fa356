//! Campaign lifecycle: starting runs and reading the current one.

use chrono::{DateTime, Utc};

use crate::domain::Campaign;
use crate::domain::campaign::week;
use crate::error::RewardsError;
use crate::persistence::StoreObj;
use crate::ws::{Broadcaster, CampaignPayload, OutboundMessage};

/// Starts campaigns and announces them.
#[derive(Debug, Clone)]
pub struct CampaignManager {
    store: StoreObj,
    broadcaster: Broadcaster,
}

impl CampaignManager {
    /// Creates a manager.
    #[must_use]
    pub const fn new(store: StoreObj, broadcaster: Broadcaster) -> Self {
        Self { store, broadcaster }
    }

    /// The most recent campaign, active or not.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Persistence`] on storage failure.
    pub async fn current(&self) -> Result<Option<Campaign>, RewardsError> {
        self.store.latest_campaign().await
    }

    /// Starts a `weeks`-long campaign at `now` unless one is already active.
    ///
    /// Returns the campaign that is active afterwards. A new run is stored
    /// as a new row, earlier runs are kept.
    ///
    /// # Errors
    ///
    /// Returns [`RewardsError::Persistence`] on storage failure, or
    /// [`RewardsError::InvalidRequest`] for a zero-week campaign.
    pub async fn ensure_campaign(
        &self,
        now: DateTime<Utc>,
        weeks: u32,
    ) -> Result<Campaign, RewardsError> {
        if let Some(active) = self.store.latest_campaign().await?.filter(|c| c.is_active) {
            tracing::info!(
                campaign = active.id,
                week = active.current_week(now),
                end = %active.end_time,
                "campaign already running"
            );
            return Ok(active);
        }
        if weeks == 0 {
            return Err(RewardsError::InvalidRequest(
                "campaign must last at least one week".to_string(),
            ));
        }

        let length = week() * i32::try_from(weeks).unwrap_or(i32::MAX);
        let campaign = self.store.start_campaign(now, now + length).await?;
        tracing::info!(
            campaign = campaign.id,
            start = %campaign.start_time,
            end = %campaign.end_time,
            weeks,
            "campaign started"
        );
        self.announce(&campaign, now).await;
        Ok(campaign)
    }

    /// Publishes a `campaign_update` for `campaign`.
    pub async fn announce(&self, campaign: &Campaign, now: DateTime<Utc>) {
        self.broadcaster
            .publish(&OutboundMessage::CampaignUpdate {
                campaign: CampaignPayload::new(campaign, now),
            })
            .await;
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStore;
    use crate::ws::BroadcasterSettings;
    use std::sync::Arc;

    #[tokio::test]
    async fn starts_once_and_reuses_active_run() {
        let store: StoreObj = Arc::new(MemoryStore::new());
        let (broadcaster, _task) = Broadcaster::start(BroadcasterSettings::default());
        let manager = CampaignManager::new(Arc::clone(&store), broadcaster);
        let now = Utc::now();

        let Ok(first) = manager.ensure_campaign(now, 4).await else {
            panic!("started");
        };
        assert_eq!(first.total_weeks(), 4);
        assert_eq!(first.current_week(now), 1);

        let Ok(second) = manager.ensure_campaign(now, 4).await else {
            panic!("reused");
        };
        assert_eq!(first.id, second.id);
        assert!(manager.ensure_campaign(now, 0).await.is_ok());
    }

    #[tokio::test]
    async fn zero_weeks_is_rejected_when_nothing_runs() {
        let store: StoreObj = Arc::new(MemoryStore::new());
        let (broadcaster, _task) = Broadcaster::start(BroadcasterSettings::default());
        let manager = CampaignManager::new(store, broadcaster);
        assert!(manager.ensure_campaign(Utc::now(), 0).await.is_err());
    }
}
