//! PostgreSQL implementation of the rewards store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};

use super::models::{
    SettlementOutcome, SettlementReport, SharePoolPlan, StoredSwap, SwapApplication, SwapReceipt,
    SwapSummary,
};
use super::store::RewardsStore;
use crate::domain::{
    Campaign, LeaderboardEntry, PointsHistoryEntry, PointsReason, RewardRules, User, ValuedSwap,
    WalletAddress,
};
use crate::error::RewardsError;

/// PostgreSQL-backed store using `sqlx::PgPool`.
///
/// Every write runs in a single transaction; the unique constraints on
/// `swap_events.transaction_hash` and `share_pool_settlements(campaign_id,
/// week)` make retried writes no-ops.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a store over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn parse_address(raw: &str) -> Result<WalletAddress, RewardsError> {
    raw.parse()
        .map_err(|e| RewardsError::Persistence(format!("corrupt address column: {e}")))
}

fn to_week(week: i32) -> u32 {
    u32::try_from(week).unwrap_or(0)
}

/// Appends a history row and adds `points` to the user total and the
/// leaderboard. Returns the new user total.
async fn credit(
    conn: &mut PgConnection,
    user_id: i64,
    address: &str,
    points: i64,
    reason: PointsReason,
    at: DateTime<Utc>,
) -> Result<i64, RewardsError> {
    sqlx::query("INSERT INTO points_history (user_id, points, reason, created_at) VALUES ($1, $2, $3, $4)")
        .bind(user_id)
        .bind(points)
        .bind(reason.as_str())
        .bind(at)
        .execute(&mut *conn)
        .await?;

    let total = sqlx::query_scalar::<_, i64>(
        "UPDATE users SET total_points = total_points + $2 WHERE id = $1 RETURNING total_points",
    )
    .bind(user_id)
    .bind(points)
    .fetch_one(&mut *conn)
    .await?;

    increment_leaderboard(conn, address, points).await?;
    Ok(total)
}

/// Upserts the leaderboard row for `address` by `delta`.
async fn increment_leaderboard(
    conn: &mut PgConnection,
    address: &str,
    delta: i64,
) -> Result<(), RewardsError> {
    sqlx::query(
        "INSERT INTO leaderboard (address, points) VALUES ($1, $2) \
         ON CONFLICT (address) DO UPDATE SET points = leaderboard.points + EXCLUDED.points",
    )
    .bind(address)
    .bind(delta)
    .execute(conn)
    .await?;
    Ok(())
}

#[async_trait]
impl RewardsStore for PostgresStore {
    async fn apply_swap(
        &self,
        swap: &ValuedSwap,
        rules: &RewardRules,
    ) -> Result<SwapApplication, RewardsError> {
        let address = swap.sender().to_string();
        let mut tx = self.pool.begin().await?;

        let (user_id, onboarding_completed) = sqlx::query_as::<_, (i64, bool)>(
            "INSERT INTO users (address) VALUES ($1) \
             ON CONFLICT (address) DO UPDATE SET address = EXCLUDED.address \
             RETURNING id, onboarding_completed",
        )
        .bind(&address)
        .fetch_one(&mut *tx)
        .await?;

        let row = StoredSwap::new(user_id, swap);
        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO swap_events (user_id, transaction_hash, sender, recipient, \
             amount0_in, amount1_in, amount0_out, amount1_out, usd_value, block_number, block_time) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
             ON CONFLICT (transaction_hash) DO NOTHING RETURNING id",
        )
        .bind(row.user_id)
        .bind(&row.transaction_hash)
        .bind(&row.sender)
        .bind(&row.recipient)
        .bind(&row.amount0_in)
        .bind(&row.amount1_in)
        .bind(&row.amount0_out)
        .bind(&row.amount1_out)
        .bind(row.usd_value)
        .bind(row.block_number)
        .bind(row.block_time)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            return Ok(SwapApplication::Duplicate);
        }

        let award = rules.award_for_swap(swap.usd_value, onboarding_completed);
        if let Some(bonus) = award.onboarding_bonus {
            sqlx::query(
                "UPDATE users SET onboarding_completed = TRUE, onboarding_points = $2 WHERE id = $1",
            )
            .bind(user_id)
            .bind(bonus)
            .execute(&mut *tx)
            .await?;
            credit(&mut tx, user_id, &address, bonus, PointsReason::Onboarding, swap.timestamp)
                .await?;
        }
        let total_points = credit(
            &mut tx,
            user_id,
            &address,
            award.swap_points,
            PointsReason::Swap,
            swap.timestamp,
        )
        .await?;

        tx.commit().await?;
        Ok(SwapApplication::Applied(SwapReceipt {
            user_id,
            address: swap.sender(),
            award,
            total_points,
        }))
    }

    async fn settle_share_pool(
        &self,
        plan: &SharePoolPlan,
        rules: &RewardRules,
    ) -> Result<SettlementOutcome, RewardsError> {
        let week = i32::try_from(plan.week)
            .map_err(|_| RewardsError::InvalidRequest(format!("week {} out of range", plan.week)))?;
        let mut tx = self.pool.begin().await?;

        let claimed = sqlx::query_scalar::<_, i32>(
            "INSERT INTO share_pool_settlements (campaign_id, week, settled_at) VALUES ($1, $2, $3) \
             ON CONFLICT (campaign_id, week) DO NOTHING RETURNING week",
        )
        .bind(plan.campaign_id)
        .bind(week)
        .bind(plan.settled_at)
        .fetch_optional(&mut *tx)
        .await?;
        if claimed.is_none() {
            tx.rollback().await?;
            return Ok(SettlementOutcome::AlreadySettled);
        }

        let rows = sqlx::query_as::<_, (i64, String, Decimal)>(
            "SELECT u.id, u.address, SUM(se.usd_value) \
             FROM users u JOIN swap_events se ON se.user_id = u.id \
             WHERE u.onboarding_completed AND se.block_time >= $1 AND se.block_time < $2 \
             GROUP BY u.id, u.address \
             HAVING SUM(se.usd_value) > 0 \
             ORDER BY u.id ASC",
        )
        .bind(plan.window_start)
        .bind(plan.window_end)
        .fetch_all(&mut *tx)
        .await?;

        let eligible: Vec<((i64, String), Decimal)> = rows
            .into_iter()
            .map(|(id, address, volume)| ((id, address), volume))
            .collect();
        let total_volume = eligible
            .iter()
            .fold(Decimal::ZERO, |acc, (_, v)| acc.saturating_add(*v));

        let mut awards = Vec::new();
        for ((user_id, address), points) in rules.allocate_share_pool(&eligible) {
            credit(
                &mut tx,
                user_id,
                &address,
                points,
                PointsReason::WeeklySharePool,
                plan.settled_at,
            )
            .await?;
            awards.push((parse_address(&address)?, points));
        }

        sqlx::query(
            "UPDATE share_pool_settlements SET total_volume = $3 WHERE campaign_id = $1 AND week = $2",
        )
        .bind(plan.campaign_id)
        .bind(week)
        .bind(total_volume)
        .execute(&mut *tx)
        .await?;

        let mut campaign_ended = false;
        if plan.end_campaign {
            let result = sqlx::query("UPDATE campaign_config SET is_active = FALSE WHERE id = $1")
                .bind(plan.campaign_id)
                .execute(&mut *tx)
                .await?;
            campaign_ended = result.rows_affected() > 0;
        }

        tx.commit().await?;
        Ok(SettlementOutcome::Settled(SettlementReport {
            week: plan.week,
            total_volume,
            awards,
            campaign_ended,
        }))
    }

    async fn leaderboard_top(&self, limit: usize) -> Result<Vec<LeaderboardEntry>, RewardsError> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            "SELECT address, points FROM leaderboard ORDER BY points DESC, id ASC LIMIT $1",
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(address, points)| {
                Ok(LeaderboardEntry {
                    address: parse_address(&address)?,
                    points,
                })
            })
            .collect()
    }

    async fn user(&self, address: WalletAddress) -> Result<Option<User>, RewardsError> {
        let row = sqlx::query_as::<_, (i64, bool, i64, i64)>(
            "SELECT id, onboarding_completed, onboarding_points, total_points \
             FROM users WHERE address = $1",
        )
        .bind(address.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(
            |(id, onboarding_completed, onboarding_points, total_points)| User {
                id,
                address,
                onboarding_completed,
                onboarding_points,
                total_points,
            },
        ))
    }

    async fn points_history(
        &self,
        address: WalletAddress,
    ) -> Result<Vec<PointsHistoryEntry>, RewardsError> {
        let rows = sqlx::query_as::<_, (i64, String, DateTime<Utc>)>(
            "SELECT ph.points, ph.reason, ph.created_at \
             FROM points_history ph JOIN users u ON u.id = ph.user_id \
             WHERE u.address = $1 \
             ORDER BY ph.created_at DESC, ph.id DESC",
        )
        .bind(address.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|(points, reason, timestamp)| {
                Ok(PointsHistoryEntry {
                    address,
                    points,
                    reason: reason.parse()?,
                    timestamp,
                })
            })
            .collect()
    }

    async fn swap_summary(&self, address: WalletAddress) -> Result<SwapSummary, RewardsError> {
        let address = address.to_string();
        let (swap_count, total_volume) = sqlx::query_as::<_, (i64, Decimal)>(
            "SELECT COUNT(se.id), COALESCE(SUM(se.usd_value), 0) \
             FROM swap_events se JOIN users u ON u.id = se.user_id \
             WHERE u.address = $1",
        )
        .bind(&address)
        .fetch_one(&self.pool)
        .await?;

        let (share_pool_points, last_share_pool_at) =
            sqlx::query_as::<_, (i64, Option<DateTime<Utc>>)>(
                "SELECT COALESCE(SUM(ph.points), 0)::BIGINT, MAX(ph.created_at) \
                 FROM points_history ph JOIN users u ON u.id = ph.user_id \
                 WHERE u.address = $1 AND ph.reason = $2",
            )
            .bind(&address)
            .bind(PointsReason::WeeklySharePool.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(SwapSummary {
            swap_count,
            total_volume,
            share_pool_points,
            last_share_pool_at,
        })
    }

    async fn latest_campaign(&self) -> Result<Option<Campaign>, RewardsError> {
        let row = sqlx::query_as::<_, (i64, DateTime<Utc>, DateTime<Utc>, bool)>(
            "SELECT id, start_time, end_time, is_active FROM campaign_config ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id, start_time, end_time, is_active)| Campaign {
            id,
            start_time,
            end_time,
            is_active,
        }))
    }

    async fn start_campaign(
        &self,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Result<Campaign, RewardsError> {
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO campaign_config (start_time, end_time, is_active) VALUES ($1, $2, TRUE) RETURNING id",
        )
        .bind(start_time)
        .bind(end_time)
        .fetch_one(&self.pool)
        .await?;

        Ok(Campaign {
            id,
            start_time,
            end_time,
            is_active: true,
        })
    }

    async fn last_settled_week(&self, campaign_id: i64) -> Result<u32, RewardsError> {
        let week = sqlx::query_scalar::<_, i32>(
            "SELECT COALESCE(MAX(week), 0) FROM share_pool_settlements WHERE campaign_id = $1",
        )
        .bind(campaign_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(to_week(week))
    }
}
