use std::sync::Arc;

use axum::{
    Router,
    routing::get,
};

use appointment_cell::{appointment_routes, dashboard_routes, review_routes, AppointmentCellState};
use doctor_cell::{doctor_routes, DoctorCellState};
use notification_cell::Notifier;
use shared_config::AppConfig;
use shared_database::Storage;
use shared_utils::clock::Clock;

pub fn create_router(
    config: Arc<AppConfig>,
    storage: Storage,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
) -> Router {
    let doctors = Arc::new(DoctorCellState::new(config.clone(), storage.clone(), clock.clone()));
    let appointments = Arc::new(AppointmentCellState::new(
        config,
        storage,
        clock,
        notifier,
        doctors.availability.clone(),
    ));

    Router::new()
        .route("/", get(|| async { "Clinic scheduling API is running!" }))
        .nest("/doctors", doctor_routes(doctors))
        .nest("/appointments", appointment_routes(appointments.clone()))
        .nest("/reviews", review_routes(appointments.clone()))
        .nest("/dashboard", dashboard_routes(appointments))
}
