//! Swap valuation: converts raw pool amounts into a USD value.
//!
//! The stablecoin leg is taken at face value. The volatile leg is
//! multiplied by a per-unit USD price from a [`PriceSource`], either the
//! pool's own reserve ratio at the swap's block ([`ReservePrice`]) or an
//! external aggregator ([`OracleFeed`]).
//!
//! All arithmetic is done on [`U256`] and converted to [`Decimal`] once at
//! the end, dropping low-order digits only when the exact value would not
//! fit a decimal mantissa.

use std::fmt;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;

use super::client::ChainClientObj;
use crate::domain::{SwapAmounts, SwapLog};
use crate::error::RewardsError;

/// `getReserves()` selector.
const GET_RESERVES: [u8; 4] = [0x09, 0x02, 0xf1, 0xac];
/// `latestRoundData()` selector.
const LATEST_ROUND_DATA: [u8; 4] = [0xfe, 0xaf, 0x96, 0x8c];
/// Fractional digits of a reserve-derived price.
const RESERVE_PRICE_SCALE: u32 = 18;
/// Largest scale a [`Decimal`] supports.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Shared handle to a price source.
pub type PriceSourceObj = Arc<dyn PriceSource>;

/// USD price of one whole unit of the volatile token.
#[async_trait]
pub trait PriceSource: Send + Sync + fmt::Debug {
    /// Short name reported on the HTTP surface.
    fn name(&self) -> &'static str;

    /// Price at the state of `block_number`.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Chain`] when the price cannot be read (transient);
    /// [`RewardsError::Valuation`] when the source answers with an unusable
    /// value.
    async fn price_at(&self, block_number: u64) -> Result<Decimal, RewardsError>;
}

/// Price derived from the pool's `getReserves()` at a block.
#[derive(Debug, Clone)]
pub struct ReservePrice {
    chain: ChainClientObj,
    pool: Address,
    volatile_decimals: u32,
    stable_decimals: u32,
}

impl ReservePrice {
    /// Creates a reserve-ratio price source for `pool`.
    #[must_use]
    pub const fn new(
        chain: ChainClientObj,
        pool: Address,
        volatile_decimals: u32,
        stable_decimals: u32,
    ) -> Self {
        Self {
            chain,
            pool,
            volatile_decimals,
            stable_decimals,
        }
    }
}

#[async_trait]
impl PriceSource for ReservePrice {
    fn name(&self) -> &'static str {
        "reserves"
    }

    async fn price_at(&self, block_number: u64) -> Result<Decimal, RewardsError> {
        let raw = self
            .chain
            .call(self.pool, Bytes::from(GET_RESERVES.to_vec()), block_number)
            .await?;
        let mut words = raw.chunks_exact(32).map(U256::from_be_slice);
        let (Some(reserve0), Some(reserve1)) = (words.next(), words.next()) else {
            return Err(RewardsError::Valuation(format!(
                "getReserves returned {} bytes",
                raw.len()
            )));
        };
        reserve_ratio(
            reserve0,
            reserve1,
            self.volatile_decimals,
            self.stable_decimals,
        )
    }
}

/// Price read from a Chainlink-style aggregator's `latestRoundData()`.
#[derive(Debug, Clone)]
pub struct OracleFeed {
    chain: ChainClientObj,
    feed: Address,
    decimals: u32,
}

impl OracleFeed {
    /// Creates an aggregator price source whose answers carry `decimals`
    /// fractional digits.
    #[must_use]
    pub const fn new(chain: ChainClientObj, feed: Address, decimals: u32) -> Self {
        Self {
            chain,
            feed,
            decimals,
        }
    }
}

#[async_trait]
impl PriceSource for OracleFeed {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn price_at(&self, block_number: u64) -> Result<Decimal, RewardsError> {
        let raw = self
            .chain
            .call(
                self.feed,
                Bytes::from(LATEST_ROUND_DATA.to_vec()),
                block_number,
            )
            .await?;
        // (roundId, answer, startedAt, updatedAt, answeredInRound)
        let Some(answer) = raw.chunks_exact(32).nth(1).map(U256::from_be_slice) else {
            return Err(RewardsError::Valuation(format!(
                "latestRoundData returned {} bytes",
                raw.len()
            )));
        };
        if answer.bit(255) {
            return Err(RewardsError::Valuation("negative oracle answer".to_string()));
        }
        if answer.is_zero() {
            return Err(RewardsError::Valuation("zero oracle answer".to_string()));
        }
        u256_to_decimal(answer, self.decimals)
    }
}

/// Which side of the pool a swap is valued from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapLeg {
    /// Raw amount of the volatile token; needs a price.
    Volatile(U256),
    /// Raw amount of the stablecoin; taken at face value.
    Stable(U256),
}

/// Picks the leg to value: `amount0In`, then `amount1Out`, then
/// `amount1In`, then `amount0Out`; the first non-zero wins.
///
/// # Errors
///
/// Returns [`RewardsError::Valuation`] for an empty swap.
pub fn select_leg(amounts: &SwapAmounts) -> Result<SwapLeg, RewardsError> {
    if amounts.is_empty() {
        return Err(RewardsError::Valuation("empty swap".to_string()));
    }
    if !amounts.amount0_in.is_zero() {
        Ok(SwapLeg::Volatile(amounts.amount0_in))
    } else if !amounts.amount1_out.is_zero() {
        Ok(SwapLeg::Stable(amounts.amount1_out))
    } else if !amounts.amount1_in.is_zero() {
        Ok(SwapLeg::Stable(amounts.amount1_in))
    } else {
        Ok(SwapLeg::Volatile(amounts.amount0_out))
    }
}

/// Values swaps, reusing one price per block.
#[derive(Debug)]
pub struct Valuator {
    prices: PriceSourceObj,
    volatile_decimals: u32,
    stable_decimals: u32,
    last_quote: Option<(u64, Decimal)>,
}

impl Valuator {
    /// Creates a valuator over `prices`.
    #[must_use]
    pub const fn new(prices: PriceSourceObj, volatile_decimals: u32, stable_decimals: u32) -> Self {
        Self {
            prices,
            volatile_decimals,
            stable_decimals,
            last_quote: None,
        }
    }

    /// Absolute USD value of `swap`.
    ///
    /// # Errors
    ///
    /// [`RewardsError::Valuation`] for an empty swap or a value that does
    /// not fit a decimal; price-source errors are passed through.
    pub async fn value(&mut self, swap: &SwapLog) -> Result<Decimal, RewardsError> {
        let usd = match select_leg(&swap.amounts)? {
            SwapLeg::Stable(amount) => u256_to_decimal(amount, self.stable_decimals)?,
            SwapLeg::Volatile(amount) => {
                let price = self.price_at(swap.block_number).await?;
                volatile_value(amount, price, self.volatile_decimals)?
            }
        };
        Ok(usd.abs())
    }

    async fn price_at(&mut self, block_number: u64) -> Result<Decimal, RewardsError> {
        if let Some((block, price)) = self.last_quote {
            if block == block_number {
                return Ok(price);
            }
        }
        let price = self.prices.price_at(block_number).await?;
        tracing::debug!(block = block_number, %price, source = self.prices.name(), "price quote");
        self.last_quote = Some((block_number, price));
        Ok(price)
    }
}

/// `amount / 10^decimals * price`, multiplied in integer space.
fn volatile_value(amount: U256, price: Decimal, decimals: u32) -> Result<Decimal, RewardsError> {
    let mantissa = u128::try_from(price.mantissa())
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| RewardsError::Valuation(format!("non-positive price {price}")))?;
    let product = amount
        .checked_mul(U256::from(mantissa))
        .ok_or_else(|| RewardsError::Valuation("swap value overflow".to_string()))?;
    u256_to_decimal(product, decimals.saturating_add(price.scale()))
}

/// `(reserve1 / 10^stable) / (reserve0 / 10^volatile)` at 18 fractional
/// digits.
fn reserve_ratio(
    reserve0: U256,
    reserve1: U256,
    volatile_decimals: u32,
    stable_decimals: u32,
) -> Result<Decimal, RewardsError> {
    if reserve0.is_zero() {
        return Err(RewardsError::Valuation("pool has no volatile reserve".to_string()));
    }
    let numerator = reserve1
        .checked_mul(pow10(volatile_decimals.saturating_add(RESERVE_PRICE_SCALE))?)
        .ok_or_else(|| RewardsError::Valuation("reserve overflow".to_string()))?;
    let denominator = reserve0
        .checked_mul(pow10(stable_decimals)?)
        .ok_or_else(|| RewardsError::Valuation("reserve overflow".to_string()))?;
    u256_to_decimal(numerator / denominator, RESERVE_PRICE_SCALE)
}

fn pow10(exp: u32) -> Result<U256, RewardsError> {
    U256::from(10u8)
        .checked_pow(U256::from(exp))
        .ok_or_else(|| RewardsError::Valuation(format!("10^{exp} overflows")))
}

/// Interprets `value` as a fixed-point number with `scale` fractional
/// digits, truncating low-order digits until it fits a [`Decimal`].
///
/// # Errors
///
/// Returns [`RewardsError::Valuation`] when the integer part alone exceeds
/// the decimal range.
pub fn u256_to_decimal(value: U256, scale: u32) -> Result<Decimal, RewardsError> {
    let max_mantissa = U256::from((1u128 << 96) - 1);
    let ten = U256::from(10u8);
    let mut value = value;
    let mut scale = scale;
    while scale > MAX_DECIMAL_SCALE || value > max_mantissa {
        if scale == 0 {
            return Err(RewardsError::Valuation(format!(
                "{value} exceeds decimal range"
            )));
        }
        value /= ten;
        scale -= 1;
    }
    let mantissa = u128::try_from(value)
        .ok()
        .and_then(|m| i128::try_from(m).ok())
        .ok_or_else(|| RewardsError::Valuation(format!("{value} exceeds decimal range")))?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|e| RewardsError::Valuation(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::chain::mock::{FixedPrice, MockChain};
    use crate::domain::WalletAddress;
    use alloy::primitives::B256;
    use std::sync::atomic::Ordering;

    const ETH: u128 = 1_000_000_000_000_000_000;

    fn swap(amounts: SwapAmounts, block_number: u64) -> SwapLog {
        SwapLog {
            tx_hash: B256::repeat_byte(1),
            block_number,
            block_time: None,
            sender: WalletAddress::new(Address::repeat_byte(2)),
            recipient: WalletAddress::new(Address::repeat_byte(3)),
            amounts,
        }
    }

    fn valuator(price: i64) -> Valuator {
        Valuator::new(Arc::new(FixedPrice(Decimal::from(price))), 18, 6)
    }

    #[tokio::test]
    async fn volatile_in_is_multiplied_by_price() {
        let amounts = SwapAmounts {
            amount0_in: U256::from(ETH),
            ..SwapAmounts::default()
        };
        let usd = valuator(2_000).value(&swap(amounts, 1)).await;
        assert_eq!(usd.ok(), Some(Decimal::from(2_000)));
    }

    #[tokio::test]
    async fn stable_out_is_taken_at_face_value() {
        let amounts = SwapAmounts {
            amount1_out: U256::from(2_000_000_000_u64),
            ..SwapAmounts::default()
        };
        let usd = valuator(9_999).value(&swap(amounts, 1)).await;
        assert_eq!(usd.ok(), Some(Decimal::from(2_000)));
    }

    #[test]
    fn branch_order_prefers_amount0_in_then_amount1_out() {
        let all = SwapAmounts {
            amount0_in: U256::from(1),
            amount1_in: U256::from(2),
            amount0_out: U256::from(3),
            amount1_out: U256::from(4),
        };
        assert_eq!(select_leg(&all).ok(), Some(SwapLeg::Volatile(U256::from(1))));

        let no_in0 = SwapAmounts {
            amount0_in: U256::ZERO,
            ..all
        };
        assert_eq!(select_leg(&no_in0).ok(), Some(SwapLeg::Stable(U256::from(4))));

        let only_in1 = SwapAmounts {
            amount1_in: U256::from(2),
            amount0_out: U256::from(3),
            ..SwapAmounts::default()
        };
        assert_eq!(select_leg(&only_in1).ok(), Some(SwapLeg::Stable(U256::from(2))));

        let only_out0 = SwapAmounts {
            amount0_out: U256::from(3),
            ..SwapAmounts::default()
        };
        assert_eq!(select_leg(&only_out0).ok(), Some(SwapLeg::Volatile(U256::from(3))));
    }

    #[test]
    fn empty_swap_is_a_valuation_error() {
        let err = select_leg(&SwapAmounts::default());
        assert!(matches!(err, Err(RewardsError::Valuation(_))));
    }

    #[test]
    fn huge_amounts_keep_integer_precision() {
        let amount = U256::from(123_456_789_u64) * pow10(18).unwrap_or_default();
        let Ok(value) = u256_to_decimal(amount, 18) else {
            panic!("fits");
        };
        assert_eq!(value, Decimal::from(123_456_789));

        assert!(u256_to_decimal(U256::MAX, 0).is_err());
    }

    #[test]
    fn reserve_ratio_scales_both_sides() {
        // 1,000 WETH against 2,000,000 USDC.
        let reserve0 = U256::from(1_000 * ETH);
        let reserve1 = U256::from(2_000_000_000_000_u64);
        let price = reserve_ratio(reserve0, reserve1, 18, 6);
        assert_eq!(price.ok(), Some(Decimal::from(2_000)));
        assert!(reserve_ratio(U256::ZERO, reserve1, 18, 6).is_err());
    }

    #[tokio::test]
    async fn reserve_source_reads_get_reserves() {
        let chain = MockChain::new(100);
        let reserves = [
            U256::from(1_000 * ETH).to_be_bytes::<32>(),
            U256::from(2_000_000_000_000_u64).to_be_bytes::<32>(),
            U256::from(1_700_000_000_u64).to_be_bytes::<32>(),
        ]
        .concat();
        chain.set_call_response(crate::config::DEFAULT_POOL_ADDRESS, reserves);
        let source = ReservePrice::new(Arc::clone(&chain) as ChainClientObj, crate::config::DEFAULT_POOL_ADDRESS, 18, 6);
        assert_eq!(source.price_at(99).await.ok(), Some(Decimal::from(2_000)));
    }

    #[tokio::test]
    async fn oracle_answer_uses_feed_decimals() {
        let chain = MockChain::new(100);
        let feed = crate::config::DEFAULT_ORACLE_ADDRESS;
        let round = [
            U256::from(1).to_be_bytes::<32>(),
            U256::from(312_345_000_000_u64).to_be_bytes::<32>(),
            U256::ZERO.to_be_bytes::<32>(),
            U256::ZERO.to_be_bytes::<32>(),
            U256::from(1).to_be_bytes::<32>(),
        ]
        .concat();
        chain.set_call_response(feed, round);
        let source = OracleFeed::new(Arc::clone(&chain) as ChainClientObj, feed, 8);
        assert_eq!(source.price_at(1).await.ok(), Some(Decimal::new(312_345, 2)));
    }

    #[tokio::test]
    async fn price_is_cached_per_block() {
        let chain = MockChain::new(100);
        let reserves = [
            U256::from(ETH).to_be_bytes::<32>(),
            U256::from(2_000_000_000_u64).to_be_bytes::<32>(),
        ]
        .concat();
        chain.set_call_response(crate::config::DEFAULT_POOL_ADDRESS, reserves);
        let source = ReservePrice::new(Arc::clone(&chain) as ChainClientObj, crate::config::DEFAULT_POOL_ADDRESS, 18, 6);
        let mut valuator = Valuator::new(Arc::new(source), 18, 6);
        let amounts = SwapAmounts {
            amount0_in: U256::from(ETH),
            ..SwapAmounts::default()
        };

        for _ in 0..3 {
            assert_eq!(
                valuator.value(&swap(amounts, 7)).await.ok(),
                Some(Decimal::from(2_000))
            );
        }
        assert_eq!(chain.calls.load(Ordering::SeqCst), 1);

        let _ = valuator.value(&swap(amounts, 8)).await;
        assert_eq!(chain.calls.load(Ordering::SeqCst), 2);
    }
}
