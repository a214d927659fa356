//! Domain layer: identities, swap and points models, campaign window,
//! and the pure reward rules.
//!
//! Nothing in here performs I/O. The ledger, distributor and stores in
//! the outer layers move these values between the chain, the database
//! and connected clients.

pub mod campaign;
pub mod points;
pub mod rules;
pub mod swap;
pub mod wallet;

pub use campaign::Campaign;
pub use points::{LeaderboardEntry, PointsHistoryEntry, PointsReason, User};
pub use rules::{RewardRules, SwapAward};
pub use swap::{SwapAmounts, SwapLog, ValuedSwap};
pub use wallet::WalletAddress;
