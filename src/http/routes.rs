use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Monitoring control
        .route("/sessions", get(handlers::list_sessions))
        .route(
            "/guilds/:guild_id/users/:user_id/monitor",
            post(handlers::start_monitoring)
                .delete(handlers::stop_monitoring)
                .get(handlers::get_monitor_status),
        )
        // Calibration
        .route(
            "/guilds/:guild_id/users/:user_id/calibrate",
            post(handlers::calibrate),
        )
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
