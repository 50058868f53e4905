use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer, Config};
use crate::handlers::{admin, events, health_check, reports, tickets};
use crate::state::AppState;

/// Routes without the cross-cutting layers.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/tickets/check-in", post(tickets::check_in))
        .route("/api/tickets/check-out", post(tickets::check_out))
        .route("/api/reports/process", post(reports::process_report))
        .route(
            "/api/admin/checkin-config",
            get(admin::get_checkin_config).put(admin::update_checkin_config),
        )
        .route(
            "/api/admin/checkin-config/reload",
            post(admin::reload_checkin_config),
        )
        .route(
            "/api/events/schedule/validate",
            post(events::validate_schedule),
        )
        .with_state(state)
}

pub fn create_routes(state: AppState, config: &Config) -> Router {
    apply_security_headers(api_routes(state), config.production)
        .layer(create_cors_layer(&config.allowed_origins))
        .layer(TraceLayer::new_for_http())
}
