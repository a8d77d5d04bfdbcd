//! Application router configuration.

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;

use super::state::AppState;
use crate::auth::auth_middleware;
use crate::handlers::{auth, basic, feed, schedules};

/// Maximum accepted request body size.
pub const MAX_REQUEST_BODY_SIZE: usize = 64 * 1024;

/// Create the application router.
pub fn create_router(state: AppState) -> Router {
    // Public routes (no authentication required)
    let public_routes = Router::new()
        .route("/api/health", get(basic::health_handler))
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler));

    // Protected routes (require a bearer token)
    let protected_routes = Router::new()
        .route("/api/auth/me", get(auth::me_handler))
        .route("/api/feed/manual", post(feed::manual_feed_handler))
        .route("/api/feed/voice", post(feed::voice_feed_handler))
        .route("/api/feed/logs", get(feed::feed_logs_handler))
        .route("/api/feed/stats/weekly", get(feed::weekly_stats_handler))
        .route(
            "/api/schedules",
            get(schedules::list_handler).post(schedules::create_handler),
        )
        .route(
            "/api/schedules/:id",
            put(schedules::update_handler).delete(schedules::delete_handler),
        )
        .route("/api/schedules/:id/toggle", patch(schedules::toggle_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(CorsLayer::permissive())
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .with_state(state)
}
