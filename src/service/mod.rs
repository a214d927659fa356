//! Service layer: business logic orchestration.
//!
//! [`RewardsLedger`] records valued swaps, [`WeeklyDistributor`] pays out
//! the weekly share pool, [`Leaderboard`] reads standings back and
//! [`CampaignManager`] starts campaign runs. All of them write through the
//! [`crate::persistence::RewardsStore`] and notify clients through the
//! [`crate::ws::Broadcaster`] after a commit.

pub mod campaign;
pub mod distributor;
pub mod leaderboard;
pub mod ledger;

pub use campaign::CampaignManager;
pub use distributor::{DistributionOutcome, WeeklyDistributor};
pub use leaderboard::Leaderboard;
pub use ledger::RewardsLedger;
