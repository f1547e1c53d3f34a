use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_database::StoreError;
use shared_models::error::AppError;
use shared_models::scheduling::{Doctor, DoctorId};

// ==============================================================================
// AVAILABILITY
// ==============================================================================

/// Live doctor status, derived from slots on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DoctorStatus {
    Available,
    Busy,
    Unavailable,
}

impl DoctorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DoctorStatus::Available => "available",
            DoctorStatus::Busy => "busy",
            DoctorStatus::Unavailable => "unavailable",
        }
    }
}

impl fmt::Display for DoctorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `?status=` filter of the doctor listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(DoctorStatus),
}

impl StatusFilter {
    pub fn matches(&self, status: DoctorStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => *wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = DoctorError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(StatusFilter::All),
            "available" => Ok(StatusFilter::Only(DoctorStatus::Available)),
            "busy" => Ok(StatusFilter::Only(DoctorStatus::Busy)),
            "unavailable" => Ok(StatusFilter::Only(DoctorStatus::Unavailable)),
            other => Err(DoctorError::InvalidStatusFilter(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotView {
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub booked: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAvailability {
    pub status: DoctorStatus,
    /// Ascending by date, then time.
    pub slots: Vec<SlotView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorWithStatus {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub experience_label: String,
    pub status: DoctorStatus,
    pub slots: Vec<SlotView>,
}

// ==============================================================================
// ADMINISTRATION
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotDayRequest {
    pub date: String,
    #[serde(default)]
    pub time: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctorRequest {
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub experience: Option<f64>,
    pub slots: Option<Vec<SlotDayRequest>>,
}

pub type CreateDoctorRequest = DoctorRequest;
pub type UpdateDoctorRequest = DoctorRequest;

#[derive(Debug, Clone, Serialize)]
pub struct DoctorSaved {
    #[serde(flatten)]
    pub doctor: Doctor,
    pub experience_label: String,
    pub slots_created: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DoctorDeleted {
    pub doctor_id: DoctorId,
    pub name: String,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found")]
    NotFound,

    #[error("All fields are required: {}", .0.join(", "))]
    MissingFields(Vec<&'static str>),

    #[error("Experience must be a valid number")]
    InvalidExperience,

    #[error("Invalid slot {field}: {value}")]
    InvalidSlot { field: &'static str, value: String },

    #[error("Doctor with this email or phone number already exists")]
    DuplicateContact,

    #[error("Cannot delete doctor with booked appointments. Please cancel or complete all appointments first.")]
    HasBookedSlots,

    #[error("Invalid status filter: {0}")]
    InvalidStatusFilter(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

impl From<DoctorError> for AppError {
    fn from(error: DoctorError) -> Self {
        match error {
            DoctorError::NotFound => AppError::NotFound(error.to_string()),
            DoctorError::MissingFields(_)
            | DoctorError::InvalidExperience
            | DoctorError::InvalidSlot { .. }
            | DoctorError::InvalidStatusFilter(_) => AppError::ValidationError(error.to_string()),
            DoctorError::DuplicateContact | DoctorError::HasBookedSlots => {
                AppError::Conflict(error.to_string())
            }
            DoctorError::Storage(e) => AppError::Database(e.to_string()),
        }
    }
}
