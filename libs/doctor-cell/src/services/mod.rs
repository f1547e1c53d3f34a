pub mod availability;
pub mod doctor;

pub use availability::{resolve_availability, AvailabilityService};
pub use doctor::DoctorService;
