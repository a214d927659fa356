//! Swap log decoding.

use alloy::primitives::{Address, B256, U256, b256};
use chrono::DateTime;

use super::client::RawLog;
use crate::domain::{SwapAmounts, SwapLog, WalletAddress};
use crate::error::RewardsError;

/// `keccak256("Swap(address,uint256,uint256,uint256,uint256,address)")`.
pub const SWAP_EVENT_TOPIC: B256 =
    b256!("0xd78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822");

const WORD: usize = 32;
const SWAP_DATA_LEN: usize = 4 * WORD;

/// Decodes a pool `Swap` log.
///
/// The payload must be exactly four big-endian words
/// (`amount0In, amount1In, amount0Out, amount1Out`); `topics[1]` and
/// `topics[2]` carry the sender and recipient.
///
/// # Errors
///
/// Returns [`RewardsError::Decode`] when the log is not a swap, has fewer
/// than three topics, or the payload is not 128 bytes.
pub fn decode_swap_log(log: &RawLog) -> Result<SwapLog, RewardsError> {
    let (Some(signature), Some(sender), Some(recipient)) =
        (log.topics.first(), log.topics.get(1), log.topics.get(2))
    else {
        return Err(RewardsError::Decode(format!(
            "expected at least 3 topics, got {}",
            log.topics.len()
        )));
    };
    if *signature != SWAP_EVENT_TOPIC {
        return Err(RewardsError::Decode(format!(
            "unexpected event signature {signature:#x}"
        )));
    }
    if log.data.len() != SWAP_DATA_LEN {
        return Err(RewardsError::Decode(format!(
            "expected {SWAP_DATA_LEN} data bytes, got {}",
            log.data.len()
        )));
    }

    let mut words = log.data.chunks_exact(WORD).map(U256::from_be_slice);
    let (Some(amount0_in), Some(amount1_in), Some(amount0_out), Some(amount1_out)) =
        (words.next(), words.next(), words.next(), words.next())
    else {
        return Err(RewardsError::Decode("truncated swap payload".to_string()));
    };

    let block_time = log
        .block_timestamp
        .and_then(|ts| i64::try_from(ts).ok())
        .and_then(|ts| DateTime::from_timestamp(ts, 0));

    Ok(SwapLog {
        tx_hash: log.tx_hash,
        block_number: log.block_number,
        block_time,
        sender: WalletAddress::new(Address::from_word(*sender)),
        recipient: WalletAddress::new(Address::from_word(*recipient)),
        amounts: SwapAmounts {
            amount0_in,
            amount1_in,
            amount0_out,
            amount1_out,
        },
    })
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, address};

    fn word(v: u128) -> [u8; 32] {
        U256::from(v).to_be_bytes::<32>()
    }

    fn swap_log(data: Vec<u8>, topics: Vec<B256>) -> RawLog {
        RawLog {
            address: crate::config::DEFAULT_POOL_ADDRESS,
            topics,
            data: Bytes::from(data),
            tx_hash: B256::repeat_byte(0xab),
            block_number: 19_000_000,
            block_timestamp: Some(1_700_000_000),
        }
    }

    fn topics() -> Vec<B256> {
        let sender = address!("0x7a250d5630B4cF539739dF2C5dAcb4c659F2488D");
        let recipient = address!("0x1111111111111111111111111111111111111111");
        vec![SWAP_EVENT_TOPIC, sender.into_word(), recipient.into_word()]
    }

    #[test]
    fn decodes_amounts_and_parties() {
        let data = [word(1_000_000_000_000_000_000), word(0), word(0), word(2_000_000_000)].concat();
        let Ok(swap) = decode_swap_log(&swap_log(data, topics())) else {
            panic!("valid swap log");
        };
        assert_eq!(swap.amounts.amount0_in, U256::from(1_000_000_000_000_000_000_u128));
        assert_eq!(swap.amounts.amount1_out, U256::from(2_000_000_000_u64));
        assert!(swap.amounts.amount1_in.is_zero());
        assert_eq!(
            swap.sender.to_string(),
            "0x7a250d5630b4cf539739df2c5dacb4c659f2488d"
        );
        assert_eq!(swap.block_number, 19_000_000);
        assert_eq!(swap.block_time.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn rejects_wrong_payload_length() {
        let data = [word(1), word(2), word(3)].concat();
        let err = decode_swap_log(&swap_log(data, topics()));
        assert!(matches!(err, Err(RewardsError::Decode(_))));

        let mut long = [word(1), word(2), word(3), word(4)].concat();
        long.push(0);
        assert!(decode_swap_log(&swap_log(long, topics())).is_err());
    }

    #[test]
    fn rejects_missing_topics() {
        let data = [word(1), word(0), word(0), word(0)].concat();
        let mut short = topics();
        short.truncate(2);
        let err = decode_swap_log(&swap_log(data, short));
        assert!(matches!(err, Err(RewardsError::Decode(_))));
    }

    #[test]
    fn rejects_foreign_event() {
        let data = [word(1), word(0), word(0), word(0)].concat();
        let mut foreign = topics();
        if let Some(first) = foreign.first_mut() {
            *first = B256::repeat_byte(0x01);
        }
        assert!(decode_swap_log(&swap_log(data, foreign)).is_err());
    }
}
