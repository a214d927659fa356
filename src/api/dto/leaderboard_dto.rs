//! Leaderboard and price DTOs.

use rust_decimal::Decimal;
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::CampaignDto;
use crate::domain::LeaderboardEntry;

/// One ranked row.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardEntryDto {
    /// Lowercase `0x` wallet address.
    pub address: String,
    /// Cumulative points.
    pub points: i64,
}

impl From<LeaderboardEntry> for LeaderboardEntryDto {
    fn from(entry: LeaderboardEntry) -> Self {
        Self {
            address: entry.address.to_string(),
            points: entry.points,
        }
    }
}

/// Response body for `GET /leaderboard`.
#[derive(Debug, Serialize, ToSchema)]
pub struct LeaderboardResponse {
    /// Standings, points descending.
    pub leaderboard: Vec<LeaderboardEntryDto>,
    /// Latest campaign, if one was ever started.
    pub campaign: Option<CampaignDto>,
}

/// Response body for `GET /ethereum/price`.
#[derive(Debug, Serialize, ToSchema)]
pub struct PriceResponse {
    /// USD price of the volatile asset.
    #[schema(value_type = String)]
    pub price: Decimal,
    /// Price source name (`reserves` or `oracle`).
    pub source: String,
    /// Block the price was read at.
    pub block: u64,
}
