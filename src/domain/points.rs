//! Users, points ledger rows and leaderboard standings.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::WalletAddress;
use crate::error::RewardsError;

/// Why a points-history row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PointsReason {
    /// One-time bonus for the first qualifying swap.
    #[serde(rename = "Onboarding")]
    Onboarding,
    /// Per-swap points.
    #[serde(rename = "Swap")]
    Swap,
    /// Weekly pro-rata share of the point pool.
    #[serde(rename = "Weekly Share Pool Task")]
    WeeklySharePool,
}

impl PointsReason {
    /// Tag stored in the `reason` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Onboarding => "Onboarding",
            Self::Swap => "Swap",
            Self::WeeklySharePool => "Weekly Share Pool Task",
        }
    }
}

impl fmt::Display for PointsReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointsReason {
    type Err = RewardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Onboarding" => Ok(Self::Onboarding),
            "Swap" => Ok(Self::Swap),
            "Weekly Share Pool Task" => Ok(Self::WeeklySharePool),
            other => Err(RewardsError::Internal(format!("unknown points reason: {other}"))),
        }
    }
}

/// A campaign participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    /// Storage row id.
    pub id: i64,
    /// Wallet identity.
    pub address: WalletAddress,
    /// Whether the onboarding bonus has been awarded.
    pub onboarding_completed: bool,
    /// Onboarding points awarded (0 or the bonus).
    pub onboarding_points: i64,
    /// Sum of every points-history row for this user.
    pub total_points: i64,
}

/// An append-only points ledger row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PointsHistoryEntry {
    /// Owner of the points.
    pub address: WalletAddress,
    /// Signed point amount.
    pub points: i64,
    /// Reason tag.
    pub reason: PointsReason,
    /// When the row was written.
    pub timestamp: DateTime<Utc>,
}

/// One row of the ranked standings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// Wallet identity.
    pub address: WalletAddress,
    /// Cumulative points.
    pub points: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_tags_round_trip_through_storage_text() {
        for reason in [
            PointsReason::Onboarding,
            PointsReason::Swap,
            PointsReason::WeeklySharePool,
        ] {
            let parsed = reason.as_str().parse::<PointsReason>().ok();
            assert_eq!(parsed, Some(reason));
        }
    }

    #[test]
    fn weekly_tag_matches_wire_text() {
        let json = serde_json::to_string(&PointsReason::WeeklySharePool).unwrap_or_default();
        assert_eq!(json, "\"Weekly Share Pool Task\"");
    }
}
