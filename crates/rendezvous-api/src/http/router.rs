//! Axum router configuration with middleware.
//!
//! JSON routes live under `/api`; `/health` and the `/ws` real-time
//! endpoint sit at the root. Middleware: CORS, tracing.

use axum::http::Uri;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::error::AppError;
use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/location/points-of-interest",
            post(handlers::location::points_of_interest),
        )
        .route("/chat/{match_id}", get(handlers::chat::get_history));

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(handlers::health::health))
        .route("/ws", get(handlers::ws::ws_handler))
        .fallback(route_not_found)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn route_not_found(uri: Uri) -> AppError {
    AppError::RouteNotFound(uri.path().to_string())
}
