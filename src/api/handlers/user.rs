//! Per-user read handlers: task status and points history.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;

use crate::api::dto::{PointsHistoryItem, TasksResponse};
use crate::app_state::AppState;
use crate::domain::WalletAddress;
use crate::error::{ErrorResponse, RewardsError};

/// `GET /user/{address}/tasks` — Onboarding and share-pool task status.
///
/// # Errors
///
/// Returns [`RewardsError::InvalidRequest`] for a malformed address,
/// [`RewardsError::UserNotFound`] when the wallet never swapped, and
/// [`RewardsError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/user/{address}/tasks",
    tag = "Users",
    summary = "Get task status",
    description = "Returns the onboarding and weekly share-pool task status of a wallet, together with the campaign window.",
    params(("address" = String, Path, description = "Wallet address (0x-prefixed hex, any case)")),
    responses(
        (status = 200, description = "Task status", body = TasksResponse),
        (status = 400, description = "Malformed address", body = ErrorResponse),
        (status = 404, description = "Unknown wallet", body = ErrorResponse),
    )
)]
pub async fn user_tasks(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, RewardsError> {
    let address: WalletAddress = address.parse()?;
    let user = state
        .store
        .user(address)
        .await?
        .ok_or_else(|| RewardsError::UserNotFound(address.to_string()))?;
    let summary = state.store.swap_summary(address).await?;
    let campaign = state.campaigns.current().await?;

    Ok(Json(TasksResponse::new(
        &user,
        &summary,
        campaign.as_ref(),
        &state.rules,
        Utc::now(),
    )))
}

/// `GET /user/{address}/points` — Points history, newest first.
///
/// # Errors
///
/// Returns [`RewardsError::InvalidRequest`] for a malformed address and
/// [`RewardsError::Persistence`] on storage failure.
#[utoipa::path(
    get,
    path = "/user/{address}/points",
    tag = "Users",
    summary = "Get points history",
    description = "Returns every points entry of a wallet, newest first. Unknown wallets have an empty history.",
    params(("address" = String, Path, description = "Wallet address (0x-prefixed hex, any case)")),
    responses(
        (status = 200, description = "Points history", body = Vec<PointsHistoryItem>),
        (status = 400, description = "Malformed address", body = ErrorResponse),
    )
)]
pub async fn user_points(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<impl IntoResponse, RewardsError> {
    let address: WalletAddress = address.parse()?;
    let history: Vec<PointsHistoryItem> = state
        .store
        .points_history(address)
        .await?
        .into_iter()
        .map(PointsHistoryItem::from)
        .collect();
    Ok(Json(history))
}

/// User routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/user/{address}/tasks", get(user_tasks))
        .route("/user/{address}/points", get(user_points))
}
