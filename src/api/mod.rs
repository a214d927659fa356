//! REST API layer: route handlers, DTOs, OpenAPI document and router
//! composition.
//!
//! Every route is a thin read over the ledger state; writes only happen in
//! the background pipeline.

pub mod dto;
pub mod handlers;

use axum::Router;
use axum::routing::get;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use crate::app_state::AppState;
use crate::error::{ErrorBody, ErrorResponse};
use crate::ws::handler::ws_handler;

/// OpenAPI document for the HTTP surface.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "rewards-gateway",
        description = "Swap rewards campaign: task status, points history, leaderboard and live updates over `/ws`."
    ),
    paths(
        handlers::system::health_handler,
        handlers::user::user_tasks,
        handlers::user::user_points,
        handlers::leaderboard::get_leaderboard,
        handlers::leaderboard::get_price,
    ),
    components(schemas(
        ErrorResponse,
        ErrorBody,
        handlers::system::HealthResponse,
        dto::TasksResponse,
        dto::OnboardingTask,
        dto::SharePoolTask,
        dto::TaskCampaign,
        dto::PointsHistoryItem,
        dto::LeaderboardResponse,
        dto::LeaderboardEntryDto,
        dto::CampaignDto,
        dto::PriceResponse,
    )),
    tags(
        (name = "System", description = "Service health"),
        (name = "Users", description = "Per-wallet task status and points"),
        (name = "Leaderboard", description = "Standings, campaign window and price"),
    )
)]
pub struct ApiDoc;

/// Builds the REST router without state.
pub fn build_router() -> Router<AppState> {
    handlers::routes()
}

/// Builds the complete application: REST routes, the `/ws` upgrade,
/// tracing and CORS layers, and Swagger UI when enabled.
pub fn build_app(state: AppState) -> Router {
    let router = build_router().route("/ws", get(ws_handler));

    #[cfg(feature = "swagger-ui")]
    let router = router.merge(
        utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
            .url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
    #[cfg(not(feature = "swagger-ui"))]
    let router = router.route(
        "/api-docs/openapi.json",
        get(|| async { axum::Json(ApiDoc::openapi()) }),
    );

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/user/{address}/tasks",
            "/user/{address}/points",
            "/leaderboard",
            "/ethereum/price",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
