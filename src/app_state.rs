//! Shared application state injected into all Axum handlers.

use crate::chain::{ChainClientObj, PriceSourceObj};
use crate::domain::RewardRules;
use crate::persistence::StoreObj;
use crate::service::{CampaignManager, Leaderboard};
use crate::ws::{Broadcaster, ConnectionSettings};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Durable rewards state.
    pub store: StoreObj,
    /// Ranked standings reader.
    pub leaderboard: Leaderboard,
    /// Campaign reader.
    pub campaigns: CampaignManager,
    /// Topic broadcaster for WebSocket clients.
    pub broadcaster: Broadcaster,
    /// Chain access for the price endpoint.
    pub chain: ChainClientObj,
    /// Configured volatile-asset price source.
    pub prices: PriceSourceObj,
    /// Reward parameters reported by the tasks endpoint.
    pub rules: RewardRules,
    /// Timing applied to every WebSocket connection.
    pub ws_settings: ConnectionSettings,
}
