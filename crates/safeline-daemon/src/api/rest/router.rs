//! API Router configuration

use super::handlers;
use super::state::AppState;
use crate::config::ServerConfig;
use axum::{
    routing::{get, patch, post},
    Router,
};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Create the main API router
pub fn create_router(state: AppState, server: &ServerConfig) -> Router {
    let api_routes = Router::new()
        // Health
        .route("/health", get(handlers::health_check))
        // Public site access
        .route(
            "/public/sites/:company_code/:site_code",
            get(handlers::resolve_site),
        )
        .route(
            "/public/sites/:company_code/:site_code/validate",
            get(handlers::validate_site),
        )
        .route(
            "/public/sites/:company_code/:site_code/incidents",
            post(handlers::submit_public_incident),
        )
        // Incidents
        .route("/incidents", get(handlers::list_incidents))
        .route("/incidents", post(handlers::create_incident))
        .route("/incidents/anonymous", post(handlers::create_anonymous_incident))
        .route("/incidents/stats", get(handlers::incident_stats))
        .route("/incidents/:id", get(handlers::get_incident))
        .route("/incidents/:id/status", patch(handlers::set_incident_status))
        .route("/incidents/:id/assign", post(handlers::assign_incident))
        .route("/incidents/:id/assignees", get(handlers::list_assignees));

    // Build router with middleware
    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    if server.enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.with_state(state)
}
