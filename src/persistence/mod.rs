//! Persistence layer: the rewards ledger's durable state.
//!
//! [`RewardsStore`] is the storage capability the services depend on.
//! [`PostgresStore`] is the production implementation over `sqlx::PgPool`;
//! [`MemoryStore`] keeps everything in process for development and tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use memory::MemoryStore;
pub use models::{
    SettlementOutcome, SettlementReport, SharePoolPlan, StoredSwap, SwapApplication, SwapReceipt,
    SwapSummary,
};
pub use postgres::PostgresStore;
pub use store::{RewardsStore, StoreObj};
