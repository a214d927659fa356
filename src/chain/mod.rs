//! Chain side of the pipeline: the client capability, swap log decoding,
//! USD valuation and the block-range poller.

pub mod client;
pub mod decoder;
pub mod poller;
pub mod rpc;
pub mod valuation;

#[cfg(test)]
pub(crate) mod mock;

pub use client::{ChainClient, ChainClientObj, RawLog};
pub use decoder::{SWAP_EVENT_TOPIC, decode_swap_log};
pub use poller::{BatchReport, Poller, PollerSettings, TickOutcome};
pub use rpc::RpcChainClient;
pub use valuation::{OracleFeed, PriceSource, PriceSourceObj, ReservePrice, Valuator};
