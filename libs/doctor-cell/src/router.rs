use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post, put},
    middleware,
};

use shared_utils::extractor::{auth_middleware, require_admin};

use crate::handlers;
use crate::DoctorCellState;

pub fn doctor_routes(state: Arc<DoctorCellState>) -> Router {
    let public_routes = Router::new()
        .route("/", get(handlers::list_doctors));

    let admin_routes = Router::new()
        .route("/", post(handlers::create_doctor))
        .route("/{doctor_id}", put(handlers::update_doctor).delete(handlers::delete_doctor))
        .layer(middleware::from_fn(require_admin))
        .layer(middleware::from_fn_with_state(state.config.clone(), auth_middleware));

    Router::new()
        .merge(public_routes)
        .merge(admin_routes)
        .with_state(state)
}
