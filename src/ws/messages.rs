//! WebSocket wire types: topics, client requests and outbound envelopes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{Campaign, LeaderboardEntry, ValuedSwap, WalletAddress};

/// Pub/sub channels a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    /// Every recorded swap.
    SwapEvents,
    /// Standings and per-user point totals.
    Leaderboard,
    /// Campaign start and end.
    Campaign,
}

impl Topic {
    /// Wire name of the topic.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SwapEvents => "swap_events",
            Self::Leaderboard => "leaderboard",
            Self::Campaign => "campaign",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "swap_events" => Ok(Self::SwapEvents),
            "leaderboard" => Ok(Self::Leaderboard),
            "campaign" => Ok(Self::Campaign),
            other => Err(format!("unknown topic: {other}")),
        }
    }
}

/// Inbound client message: `{"action": "subscribe", "topic": "leaderboard"}`.
///
/// Both fields stay raw strings so unknown values can be logged and ignored
/// instead of failing the whole message.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRequest {
    /// `subscribe` or `unsubscribe`.
    pub action: String,
    /// Topic name.
    #[serde(default)]
    pub topic: String,
}

/// A recorded swap as pushed to `swap_events` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SwapEventPayload {
    /// Transaction hash.
    pub tx_hash: String,
    /// Trader credited with the swap.
    pub sender: WalletAddress,
    /// Recipient of the output tokens.
    pub recipient: WalletAddress,
    /// Raw token0 in.
    pub amount0_in: String,
    /// Raw token1 in.
    pub amount1_in: String,
    /// Raw token0 out.
    pub amount0_out: String,
    /// Raw token1 out.
    pub amount1_out: String,
    /// USD value.
    pub usd_value: Decimal,
    /// Points the swap earned, onboarding bonus included.
    pub points: i64,
    /// Block number.
    pub block_number: u64,
    /// Swap timestamp.
    pub timestamp: DateTime<Utc>,
}

impl SwapEventPayload {
    /// Builds the payload for a recorded swap.
    #[must_use]
    pub fn new(swap: &ValuedSwap, points: i64) -> Self {
        let log = &swap.log;
        Self {
            tx_hash: log.tx_hash_hex(),
            sender: log.sender,
            recipient: log.recipient,
            amount0_in: log.amounts.amount0_in.to_string(),
            amount1_in: log.amounts.amount1_in.to_string(),
            amount0_out: log.amounts.amount0_out.to_string(),
            amount1_out: log.amounts.amount1_out.to_string(),
            usd_value: swap.usd_value,
            points,
            block_number: log.block_number,
            timestamp: swap.timestamp,
        }
    }
}

/// Campaign state as pushed to `campaign` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignPayload {
    /// Campaign row id.
    pub id: i64,
    /// Start time.
    pub start_time: DateTime<Utc>,
    /// End time.
    pub end_time: DateTime<Utc>,
    /// Whether the campaign is running.
    pub is_active: bool,
    /// Campaign length in weeks.
    pub total_weeks: u32,
    /// Week in progress at send time.
    pub current_week: u32,
}

impl CampaignPayload {
    /// Snapshot of `campaign` as of `now`.
    #[must_use]
    pub fn new(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self {
            id: campaign.id,
            start_time: campaign.start_time,
            end_time: campaign.end_time,
            is_active: campaign.is_active,
            total_weeks: campaign.total_weeks(),
            current_week: campaign.current_week(now),
        }
    }
}

/// Server-to-client envelope, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundMessage {
    /// A swap was recorded.
    SwapEvent {
        /// The swap.
        event: SwapEventPayload,
    },
    /// Current top standings.
    LeaderboardUpdate {
        /// Ranked entries.
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// A user's new point total.
    UserPointsUpdate {
        /// Wallet.
        address: WalletAddress,
        /// Total points.
        points: i64,
    },
    /// Campaign started or ended.
    CampaignUpdate {
        /// Campaign state.
        campaign: CampaignPayload,
    },
}

impl OutboundMessage {
    /// Topic this message is delivered on.
    #[must_use]
    pub const fn topic(&self) -> Topic {
        match self {
            Self::SwapEvent { .. } => Topic::SwapEvents,
            Self::LeaderboardUpdate { .. } | Self::UserPointsUpdate { .. } => Topic::Leaderboard,
            Self::CampaignUpdate { .. } => Topic::Campaign,
        }
    }

    /// The `type` tag.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SwapEvent { .. } => "swap_event",
            Self::LeaderboardUpdate { .. } => "leaderboard_update",
            Self::UserPointsUpdate { .. } => "user_points_update",
            Self::CampaignUpdate { .. } => "campaign_update",
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    #[test]
    fn topics_round_trip_wire_names() {
        for topic in [Topic::SwapEvents, Topic::Leaderboard, Topic::Campaign] {
            assert_eq!(topic.as_str().parse::<Topic>(), Ok(topic));
        }
        assert!("prices".parse::<Topic>().is_err());
    }

    #[test]
    fn envelope_is_tagged_by_type() {
        let msg = OutboundMessage::UserPointsUpdate {
            address: WalletAddress::new(Address::repeat_byte(0xab)),
            points: 255,
        };
        let Ok(value) = serde_json::to_value(&msg) else {
            panic!("serializable");
        };
        assert_eq!(value.get("type").and_then(|v| v.as_str()), Some("user_points_update"));
        assert_eq!(value.get("points").and_then(serde_json::Value::as_i64), Some(255));
        assert_eq!(msg.kind(), "user_points_update");
        assert_eq!(msg.topic(), Topic::Leaderboard);
    }

    #[test]
    fn client_request_tolerates_missing_topic() {
        let Ok(req) = serde_json::from_str::<ClientRequest>(r#"{"action":"ping"}"#) else {
            panic!("parses");
        };
        assert_eq!(req.action, "ping");
        assert!(req.topic.is_empty());
    }
}
