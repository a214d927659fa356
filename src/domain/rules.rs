//! Reward rules: onboarding bonus, per-swap points, weekly share pool.
//!
//! These are pure functions over values read inside a storage transaction.
//! Every [`crate::persistence::RewardsStore`] implementation calls them so
//! the arithmetic is identical regardless of backend.

use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

use super::campaign::week;

/// Campaign reward parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewardRules {
    /// Minimum USD value of the swap that completes onboarding.
    pub onboarding_threshold_usd: Decimal,
    /// Points awarded once for completing onboarding.
    pub onboarding_bonus: i64,
    /// USD of swap value per point.
    pub usd_per_point: Decimal,
    /// Floor for per-swap points.
    pub min_swap_points: i64,
    /// Points distributed every week.
    pub share_pool_points: i64,
    /// Trailing window the weekly volume is summed over.
    pub share_pool_window: Duration,
}

impl Default for RewardRules {
    fn default() -> Self {
        Self {
            onboarding_threshold_usd: Decimal::from(1_000),
            onboarding_bonus: 100,
            usd_per_point: Decimal::TEN,
            min_swap_points: 1,
            share_pool_points: 10_000,
            share_pool_window: week(),
        }
    }
}

/// Points produced by one swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAward {
    /// Onboarding bonus, if this swap completed onboarding.
    pub onboarding_bonus: Option<i64>,
    /// Per-swap points.
    pub swap_points: i64,
}

impl SwapAward {
    /// Total points this swap adds to the user and the leaderboard.
    #[must_use]
    pub fn total(&self) -> i64 {
        self.swap_points.saturating_add(self.onboarding_bonus.unwrap_or(0))
    }
}

impl RewardRules {
    /// Points for a swap of `usd_value`: one per `usd_per_point`, never
    /// below `min_swap_points`.
    #[must_use]
    pub fn swap_points(&self, usd_value: Decimal) -> i64 {
        let raw = usd_value
            .abs()
            .checked_div(self.usd_per_point)
            .map(|p| p.floor())
            .and_then(|p| p.to_i64())
            .unwrap_or(i64::MAX);
        raw.max(self.min_swap_points)
    }

    /// Applies both per-swap rules for a user whose onboarding flag is
    /// `onboarding_completed` before this swap.
    #[must_use]
    pub fn award_for_swap(&self, usd_value: Decimal, onboarding_completed: bool) -> SwapAward {
        let onboarding_bonus = (!onboarding_completed
            && usd_value.abs() >= self.onboarding_threshold_usd)
            .then_some(self.onboarding_bonus);
        SwapAward {
            onboarding_bonus,
            swap_points: self.swap_points(usd_value),
        }
    }

    /// Splits the weekly point pool pro-rata by volume.
    ///
    /// `volumes` must be in storage order; entries with non-positive volume
    /// are ignored. Participants are ranked by volume descending, equal
    /// volumes keep their input order. Everyone but the last ranked
    /// participant gets `floor(pool * volume / total)` (at least 1); the
    /// last one absorbs the remainder, so the returned points always sum to
    /// exactly `share_pool_points`. Once the pool is exhausted nobody else
    /// is paid, and zero awards are not returned.
    #[must_use]
    pub fn allocate_share_pool<K: Clone>(&self, volumes: &[(K, Decimal)]) -> Vec<(K, i64)> {
        let pool = self.share_pool_points;
        let mut ranked: Vec<&(K, Decimal)> =
            volumes.iter().filter(|(_, v)| v.is_sign_positive() && !v.is_zero()).collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let total = ranked
            .iter()
            .try_fold(Decimal::ZERO, |acc, (_, v)| acc.checked_add(*v));
        let Some(total) = total.filter(|t| !t.is_zero()) else {
            return Vec::new();
        };
        if pool <= 0 {
            return Vec::new();
        }

        let mut awards = Vec::with_capacity(ranked.len());
        let mut remaining = pool;
        let last = ranked.len().saturating_sub(1);
        for (idx, (key, volume)) in ranked.into_iter().enumerate() {
            if remaining == 0 {
                break;
            }
            let points = if idx == last {
                remaining
            } else {
                pro_rata(pool, *volume, total).max(1).min(remaining)
            };
            remaining -= points;
            awards.push((key.clone(), points));
        }
        awards
    }
}

/// `floor(pool * volume / total)`, computed multiply-first when it fits.
fn pro_rata(pool: i64, volume: Decimal, total: Decimal) -> i64 {
    let pool = Decimal::from(pool);
    let share = pool
        .checked_mul(volume)
        .and_then(|scaled| scaled.checked_div(total))
        .or_else(|| volume.checked_div(total).and_then(|f| f.checked_mul(pool)));
    share.and_then(|s| s.floor().to_i64()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usd(v: i64) -> Decimal {
        Decimal::from(v)
    }

    #[test]
    fn one_point_per_ten_usd() {
        let rules = RewardRules::default();
        assert_eq!(rules.swap_points(usd(100)), 10);
        assert_eq!(rules.swap_points(usd(1_000)), 100);
        assert_eq!(rules.swap_points(Decimal::new(1999, 1)), 19);
    }

    #[test]
    fn swap_points_never_below_one() {
        let rules = RewardRules::default();
        assert_eq!(rules.swap_points(usd(5)), 1);
        assert_eq!(rules.swap_points(Decimal::ZERO), 1);
    }

    #[test]
    fn onboarding_requires_threshold_and_unset_flag() {
        let rules = RewardRules::default();
        let first = rules.award_for_swap(usd(1_500), false);
        assert_eq!(first.onboarding_bonus, Some(100));
        assert_eq!(first.swap_points, 150);
        assert_eq!(first.total(), 250);

        assert_eq!(rules.award_for_swap(usd(1_500), true).onboarding_bonus, None);
        assert_eq!(rules.award_for_swap(usd(999), false).onboarding_bonus, None);
        assert_eq!(rules.award_for_swap(usd(1_000), false).onboarding_bonus, Some(100));
    }

    #[test]
    fn share_pool_sums_to_pool_exactly() {
        let rules = RewardRules::default();
        let volumes = vec![("a", usd(1)), ("b", usd(1)), ("c", usd(1))];
        let awards = rules.allocate_share_pool(&volumes);
        assert_eq!(awards, vec![("a", 3_333), ("b", 3_333), ("c", 3_334)]);
        assert_eq!(awards.iter().map(|(_, p)| p).sum::<i64>(), 10_000);
    }

    #[test]
    fn share_pool_orders_by_volume_with_stable_ties() {
        let rules = RewardRules::default();
        let volumes = vec![("small", usd(100)), ("big", usd(700)), ("tie", usd(100))];
        let awards = rules.allocate_share_pool(&volumes);
        assert_eq!(awards, vec![("big", 7_777), ("small", 1_111), ("tie", 1_112)]);
    }

    #[test]
    fn tiny_volume_gets_minimum_one_point() {
        let rules = RewardRules::default();
        let volumes = vec![
            ("whale", usd(1_000_000)),
            ("dust", Decimal::new(1, 2)),
            ("tail", Decimal::new(1, 2)),
        ];
        let awards = rules.allocate_share_pool(&volumes);
        let dust = awards.iter().find(|(k, _)| *k == "dust").map(|(_, p)| *p);
        assert_eq!(dust, Some(1));
        assert_eq!(awards.iter().map(|(_, p)| p).sum::<i64>(), 10_000);
    }

    #[test]
    fn zero_total_volume_allocates_nothing() {
        let rules = RewardRules::default();
        let volumes = vec![("a", Decimal::ZERO)];
        assert!(rules.allocate_share_pool(&volumes).is_empty());
        assert!(rules.allocate_share_pool::<&str>(&[]).is_empty());
    }

    #[test]
    fn pool_smaller_than_participants_is_not_overdrawn() {
        let rules = RewardRules {
            share_pool_points: 2,
            ..RewardRules::default()
        };
        let volumes = vec![("a", usd(1)), ("b", usd(1)), ("c", usd(1))];
        let awards = rules.allocate_share_pool(&volumes);
        assert_eq!(awards, vec![("a", 1), ("b", 1)]);
    }

    #[test]
    fn single_participant_takes_whole_pool() {
        let rules = RewardRules::default();
        let awards = rules.allocate_share_pool(&[("solo", usd(42))]);
        assert_eq!(awards, vec![("solo", 10_000)]);
    }
}
