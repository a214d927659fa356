//! Case-normalized wallet identity.
//!
//! [`WalletAddress`] is a newtype around [`alloy::primitives::Address`]
//! whose textual form is always lowercase `0x`-prefixed hex, so the same
//! wallet maps to the same user row and leaderboard entry no matter how a
//! client or node spelled it.

use std::fmt;
use std::str::FromStr;

use alloy::primitives::Address;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::RewardsError;

/// Identity of a campaign participant.
///
/// Created from the `sender` topic of a swap log, or parsed from a path
/// segment on the HTTP surface. Used as the unique key of users and
/// leaderboard entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WalletAddress(Address);

impl WalletAddress {
    /// Wraps a raw chain address.
    #[must_use]
    pub const fn new(address: Address) -> Self {
        Self(address)
    }
}

impl fmt::Display for WalletAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl FromStr for WalletAddress {
    type Err = RewardsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<Address>()
            .map(Self)
            .map_err(|e| RewardsError::InvalidRequest(format!("invalid wallet address {s:?}: {e}")))
    }
}

impl From<Address> for WalletAddress {
    fn from(address: Address) -> Self {
        Self(address)
    }
}

impl Serialize for WalletAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for WalletAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
