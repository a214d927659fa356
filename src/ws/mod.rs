//! WebSocket layer: topic broadcaster, wire messages, subscriptions and
//! connection handling.
//!
//! Clients connect to `/ws`, then send
//! `{"action": "subscribe" | "unsubscribe", "topic": "<name>"}` to choose
//! which of the `swap_events`, `leaderboard` and `campaign` topics they
//! receive.

pub mod broadcaster;
pub mod connection;
pub mod handler;
pub mod messages;
pub mod subscription;

pub use broadcaster::{Broadcaster, BroadcasterSettings, ClientHandle, ClientId};
pub use connection::ConnectionSettings;
pub use messages::{CampaignPayload, OutboundMessage, SwapEventPayload, Topic};
pub use subscription::SubscriptionSet;
