use std::sync::Arc;

use shared_config::AppConfig;
use shared_database::Storage;
use shared_utils::clock::Clock;

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::*;
pub use router::doctor_routes;
pub use services::*;

/// Shared state of the doctor routes.
pub struct DoctorCellState {
    pub config: Arc<AppConfig>,
    pub doctors: DoctorService,
    pub availability: Arc<AvailabilityService>,
}

impl DoctorCellState {
    pub fn new(config: Arc<AppConfig>, storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            doctors: DoctorService::new(storage.clone(), clock.clone()),
            availability: Arc::new(AvailabilityService::new(storage, clock)),
        }
    }
}
