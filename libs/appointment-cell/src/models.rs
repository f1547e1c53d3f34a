use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{Appointment, AppointmentId, AppointmentStatus, DoctorId};

// ==============================================================================
// BOOKING
// ==============================================================================

/// Raw booking form. Every field is optional so missing ones can be reported
/// together instead of failing on the first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    /// Number or numeric string.
    pub doctor_id: Option<Value>,
    pub patient_name: Option<String>,
    pub patient_email: Option<String>,
    pub patient_phone: Option<String>,
    pub appointment_date: Option<String>,
    pub appointment_time: Option<String>,
    pub reason: Option<String>,
}

/// A booking request that passed field validation.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedBooking {
    pub doctor_id: DoctorId,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BookingConfirmation {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub doctor_name: String,
    pub doctor_specialization: String,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
}

#[derive(Error, Debug)]
pub enum BookingError {
    #[error("All required fields must be provided: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Cannot book appointments less than 1 hour in advance")]
    TooSoon,

    #[error("Doctor not found")]
    DoctorNotFound,

    #[error("Appointment slot not found")]
    SlotNotFound,

    #[error("This appointment slot is already booked")]
    SlotAlreadyBooked,

    #[error("You already have an appointment with this doctor on this date")]
    DuplicateBooking,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<BookingError> for AppError {
    fn from(error: BookingError) -> Self {
        match error {
            BookingError::MissingFields(_)
            | BookingError::InvalidField { .. }
            | BookingError::TooSoon => AppError::ValidationError(error.to_string()),
            BookingError::DoctorNotFound | BookingError::SlotNotFound => {
                AppError::NotFound(error.to_string())
            }
            BookingError::SlotAlreadyBooked | BookingError::DuplicateBooking => {
                AppError::Conflict(error.to_string())
            }
            BookingError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatusUpdateRequest {
    pub appointment_id: Option<AppointmentId>,
    pub status: Option<String>,
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TransitionOutcome {
    pub appointment: Appointment,
    pub message: &'static str,
    /// Side effects that failed without undoing the transition.
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusUpdateResponse {
    pub appointment_id: AppointmentId,
    pub status: AppointmentStatus,
    pub message: String,
    pub warnings: Vec<String>,
}

impl From<TransitionOutcome> for StatusUpdateResponse {
    fn from(outcome: TransitionOutcome) -> Self {
        Self {
            appointment_id: outcome.appointment.id,
            status: outcome.appointment.status,
            message: outcome.message.to_string(),
            warnings: outcome.warnings,
        }
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    #[error("Appointment not found")]
    NotFound,

    #[error("Cannot change appointment status from {from} to {to}")]
    InvalidTransition { from: AppointmentStatus, to: AppointmentStatus },

    #[error("Review link could not be issued: {0}")]
    ReviewToken(#[from] ReviewError),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<LifecycleError> for AppError {
    fn from(error: LifecycleError) -> Self {
        match error {
            LifecycleError::InvalidStatus(_) => AppError::ValidationError(error.to_string()),
            LifecycleError::NotFound => AppError::NotFound(error.to_string()),
            LifecycleError::InvalidTransition { .. } => AppError::BadRequest(error.to_string()),
            LifecycleError::ReviewToken(_) => AppError::Internal(error.to_string()),
            LifecycleError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}

// ==============================================================================
// LISTING AND STATS
// ==============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentWithDoctor {
    #[serde(flatten)]
    pub appointment: Appointment,
    /// `None` once the doctor has been deleted.
    pub doctor_name: Option<String>,
    pub doctor_specialization: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DashboardStats {
    pub total_doctors: usize,
    pub available_doctors: usize,
    pub busy_doctors: usize,
    pub unavailable_doctors: usize,
    pub total_appointments: usize,
    pub pending_appointments: usize,
    pub approved_appointments: usize,
    pub rejected_appointments: usize,
    pub completed_appointments: usize,
    pub cancelled_appointments: usize,
}

// ==============================================================================
// REVIEWS
// ==============================================================================

/// Decoded review token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewClaims {
    pub appointment_id: AppointmentId,
    pub issued_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewSubmitRequest {
    pub token: Option<String>,
    pub rating: Option<i64>,
    pub review_text: Option<String>,
}

/// What the review page shows before the patient rates the visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewContext {
    pub appointment_id: AppointmentId,
    pub patient_name: String,
    pub doctor_id: DoctorId,
    pub doctor_name: Option<String>,
    pub doctor_specialization: Option<String>,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewReceipt {
    pub appointment_id: AppointmentId,
    pub rating: i16,
    pub reviewed_at: DateTime<Utc>,
}

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Token is required")]
    MissingToken,

    #[error("Invalid or expired review link")]
    InvalidToken,

    #[error("Rating must be a whole number between 1 and 5")]
    InvalidRating,

    #[error("Appointment not found")]
    NotFound,

    #[error("Review already submitted")]
    AlreadyReviewed,

    #[error("Review token could not be signed")]
    Signing,

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<ReviewError> for AppError {
    fn from(error: ReviewError) -> Self {
        match error {
            ReviewError::MissingToken | ReviewError::InvalidToken | ReviewError::InvalidRating => {
                AppError::ValidationError(error.to_string())
            }
            ReviewError::NotFound => AppError::NotFound(error.to_string()),
            ReviewError::AlreadyReviewed => AppError::Conflict(error.to_string()),
            ReviewError::Signing => AppError::Internal(error.to_string()),
            ReviewError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}
