//! # rewards-gateway
//!
//! Swap-driven rewards campaign service for a single Uniswap V2 style pool.
//!
//! Swap events are polled from the chain, valued in USD and turned into
//! points exactly once per transaction. A weekly job splits a fixed point
//! pool across onboarded users by volume. Standings and swaps are pushed
//! live to WebSocket subscribers by topic, and a thin REST surface serves
//! task status, points history and the leaderboard.
//!
//! ## Architecture
//!
//! ```text
//! Chain (JSON-RPC)
//!     │
//!     ├── Poller ─ decoder ─ Valuator (chain/)
//!     │
//!     ├── RewardsLedger, WeeklyDistributor (service/)
//!     ├── Leaderboard, CampaignManager (service/)
//!     │
//!     ├── RewardsStore: PostgreSQL | memory (persistence/)
//!     │
//!     ├── Broadcaster ─ /ws connections (ws/)
//!     └── REST handlers (api/)
//! ```

pub mod api;
pub mod app_state;
pub mod chain;
pub mod config;
pub mod domain;
pub mod error;
pub mod persistence;
pub mod service;
pub mod ws;
