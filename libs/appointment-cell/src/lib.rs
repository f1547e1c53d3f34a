use std::sync::Arc;

use doctor_cell::AvailabilityService;
use notification_cell::Notifier;
use shared_config::AppConfig;
use shared_database::Storage;
use shared_utils::clock::Clock;

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::{appointment_routes, dashboard_routes, review_routes};
pub use services::*;

/// Shared state of the appointment, review and dashboard routes.
pub struct AppointmentCellState {
    pub config: Arc<AppConfig>,
    pub booking: BookingService,
    pub lifecycle: LifecycleService,
    pub reviews: ReviewService,
    pub admin: AdminViewService,
}

impl AppointmentCellState {
    pub fn new(
        config: Arc<AppConfig>,
        storage: Storage,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        availability: Arc<AvailabilityService>,
    ) -> Self {
        let signer = Arc::new(ReviewTokenSigner::new(&config.review_token_secret));

        Self {
            booking: BookingService::new(storage.clone(), clock.clone(), notifier.clone()),
            lifecycle: LifecycleService::new(
                config.clone(),
                storage.clone(),
                clock.clone(),
                notifier,
                signer.clone(),
            ),
            reviews: ReviewService::new(storage.clone(), clock, signer),
            admin: AdminViewService::new(storage, availability),
            config,
        }
    }
}
