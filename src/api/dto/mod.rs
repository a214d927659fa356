//! Data Transfer Objects for REST response serialization.
//!
//! USD amounts are serialized as JSON strings to keep decimal precision.

pub mod common_dto;
pub mod leaderboard_dto;
pub mod user_dto;

pub use common_dto::*;
pub use leaderboard_dto::*;
pub use user_dto::*;
