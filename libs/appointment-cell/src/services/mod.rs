pub mod booking;
pub mod lifecycle;
pub mod notify;
pub mod review;
pub mod stats;

pub use booking::BookingService;
pub use lifecycle::{LifecycleService, DEFAULT_REJECTION_REASON};
pub use review::{ReviewService, ReviewTokenSigner};
pub use stats::AdminViewService;
