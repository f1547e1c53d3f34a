use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type DoctorId = i64;
pub type AppointmentId = i64;

// ==============================================================================
// DOCTORS AND SLOTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Doctor {
    pub id: DoctorId,
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    /// Years of practice, fractional (1.5 = 1 year 6 months).
    pub experience: f64,
    #[serde(default)]
    pub completed_appointments: i32,
    #[serde(default)]
    pub total_appointments: i32,
    pub created_at: DateTime<Utc>,
}

impl Doctor {
    pub fn experience_label(&self) -> String {
        format_experience(self.experience)
    }
}

pub fn format_experience(experience: f64) -> String {
    let years = experience.floor() as i64;
    let mut months = ((experience - experience.floor()) * 12.0).round() as i64;
    let years = if months == 12 {
        months = 0;
        years + 1
    } else {
        years
    };

    let mut parts = Vec::new();
    if years > 0 {
        parts.push(format!("{} year{}", years, if years > 1 { "s" } else { "" }));
    }
    if months > 0 {
        parts.push(format!("{} month{}", months, if months > 1 { "s" } else { "" }));
    }

    if parts.is_empty() {
        "Less than a month".to_string()
    } else {
        parts.join(" ")
    }
}

/// Admin-editable doctor fields, shared by create and update.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DoctorDetails {
    pub name: String,
    pub specialization: String,
    pub email: String,
    pub phone: String,
    pub experience: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Slot {
    pub doctor_id: DoctorId,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub booked: bool,
}

impl Slot {
    pub fn starts_at(&self) -> DateTime<Utc> {
        slot_instant(self.date, self.time)
    }
}

/// Slot dates and times are clinic wall-clock values stored in UTC.
pub fn slot_instant(date: NaiveDate, time: NaiveTime) -> DateTime<Utc> {
    date.and_time(time).and_utc()
}

/// Accepts `YYYY-MM-DD`.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Accepts `HH:MM` and `HH:MM:SS`.
pub fn parse_time(value: &str) -> Option<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M"))
        .ok()
}

// ==============================================================================
// APPOINTMENTS
// ==============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
    Cancelled,
}

impl AppointmentStatus {
    pub const ALL: [AppointmentStatus; 5] = [
        AppointmentStatus::Pending,
        AppointmentStatus::Approved,
        AppointmentStatus::Rejected,
        AppointmentStatus::Completed,
        AppointmentStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Pending => "pending",
            AppointmentStatus::Approved => "approved",
            AppointmentStatus::Rejected => "rejected",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled
        )
    }

    /// Whether an appointment in this status keeps its slot booked.
    pub fn holds_slot(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Pending | AppointmentStatus::Approved | AppointmentStatus::Completed
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown appointment status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        AppointmentStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == value)
            .ok_or_else(|| UnknownStatus(value.to_string()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: AppointmentId,
    pub doctor_id: DoctorId,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub review_token: Option<String>,
    #[serde(default)]
    pub review_token_sent_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub review_rating: Option<i16>,
    #[serde(default)]
    pub review_text: Option<String>,
}

impl Appointment {
    pub fn starts_at(&self) -> DateTime<Utc> {
        slot_instant(self.appointment_date, self.appointment_time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewAppointment {
    pub doctor_id: DoctorId,
    pub patient_name: String,
    pub patient_email: String,
    pub patient_phone: String,
    pub appointment_date: NaiveDate,
    pub appointment_time: NaiveTime,
    pub reason: Option<String>,
    pub status: AppointmentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Full replacement of the status columns, applied only if the stored status
/// still equals the expected one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StatusChange {
    pub status: AppointmentStatus,
    pub review_token: Option<String>,
    pub review_token_sent_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReviewSubmission {
    pub review_rating: i16,
    pub review_text: Option<String>,
    pub reviewed_at: DateTime<Utc>,
}
