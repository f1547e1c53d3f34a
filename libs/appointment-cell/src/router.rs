use std::sync::Arc;

use axum::{
    Router,
    routing::{get, patch, post},
    middleware,
};

use shared_utils::extractor::{auth_middleware, require_admin};

use crate::handlers;
use crate::AppointmentCellState;

/// Mounted under `/appointments`.
pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    let public_routes = Router::new()
        .route("/", post(handlers::book_appointment));

    let admin_routes = Router::new()
        .route("/", get(handlers::list_appointments))
        .route("/status", patch(handlers::update_appointment_status))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}

/// Mounted under `/reviews`.
pub fn review_routes(state: Arc<AppointmentCellState>) -> Router {
    Router::new()
        .route("/verify", get(handlers::verify_review_token))
        .route("/submit", post(handlers::submit_review))
        .with_state(state)
}

/// Mounted under `/dashboard`.
pub fn dashboard_routes(state: Arc<AppointmentCellState>) -> Router {
    Router::new()
        .route("/stats", get(handlers::dashboard_stats))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware))
        .with_state(state)
}
