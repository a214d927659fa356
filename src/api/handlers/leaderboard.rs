//! Leaderboard and price read handlers.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{
    CampaignDto, LeaderboardEntryDto, LeaderboardResponse, LimitParams, PriceResponse,
};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, RewardsError};

/// `GET /leaderboard` — Ranked standings and campaign window.
///
/// # Errors
///
/// Returns [`RewardsError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/leaderboard",
    tag = "Leaderboard",
    summary = "Get leaderboard",
    description = "Returns the top wallets by points (ties in first-scored order) and the current campaign window.",
    params(LimitParams),
    responses(
        (status = 200, description = "Standings", body = LeaderboardResponse),
    )
)]
pub async fn get_leaderboard(
    State(state): State<AppState>,
    Query(params): Query<LimitParams>,
) -> Result<impl IntoResponse, RewardsError> {
    let leaderboard = state
        .leaderboard
        .top(params.clamped())
        .await?
        .into_iter()
        .map(LeaderboardEntryDto::from)
        .collect();
    let now = Utc::now();
    let campaign = state
        .campaigns
        .current()
        .await?
        .map(|c| CampaignDto::new(&c, now));

    Ok(Json(LeaderboardResponse {
        leaderboard,
        campaign,
    }))
}

/// `GET /ethereum/price` — Volatile-asset USD price at the latest block.
///
/// # Errors
///
/// Returns [`RewardsError::Chain`] when the node cannot be reached and
/// [`RewardsError::Valuation`] when the source returns an unusable price.
#[utoipa::path(
    get,
    path = "/ethereum/price",
    tag = "Leaderboard",
    summary = "Get ETH price",
    description = "Reads the configured price source (pool reserves or oracle feed) at the latest block.",
    responses(
        (status = 200, description = "Current price", body = PriceResponse),
        (status = 502, description = "Chain unavailable", body = ErrorResponse),
    )
)]
pub async fn get_price(State(state): State<AppState>) -> Result<impl IntoResponse, RewardsError> {
    let block = state.chain.latest_block().await?;
    let price = state.prices.price_at(block).await?;
    Ok(Json(PriceResponse {
        price,
        source: state.prices.name().to_string(),
        block,
    }))
}

/// Leaderboard and price routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/leaderboard", get(get_leaderboard))
        .route("/ethereum/price", get(get_price))
}
