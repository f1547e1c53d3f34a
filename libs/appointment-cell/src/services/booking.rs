use std::sync::Arc;

use chrono::Duration;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use notification_cell::{Notification, NotificationKind, Notifier};
use shared_database::{SlotClaim, Storage, StoreError};
use shared_models::scheduling::{
    parse_date, parse_time, slot_instant, AppointmentStatus, DoctorId, NewAppointment,
};
use shared_utils::clock::Clock;

use crate::models::{BookAppointmentRequest, BookingConfirmation, BookingError, ValidatedBooking};
use crate::services::notify::notification_context;

/// Bookings must start at least this far in the future.
pub fn minimum_lead_time() -> Duration {
    Duration::hours(1)
}

pub struct BookingService {
    storage: Storage,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
}

impl BookingService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>) -> Self {
        Self { storage, clock, notifier }
    }

    /// Books a free slot for a patient.
    ///
    /// The pre-checks only produce precise errors; the conditional slot claim
    /// is what serializes concurrent requests for the same slot.
    #[instrument(skip(self, request))]
    pub async fn book(&self, request: BookAppointmentRequest) -> Result<BookingConfirmation, BookingError> {
        let booking = validate_booking(&request)?;

        let starts_at = slot_instant(booking.appointment_date, booking.appointment_time);
        if starts_at < self.clock.now() + minimum_lead_time() {
            return Err(BookingError::TooSoon);
        }

        let doctor = self.storage.doctors
            .get_doctor(booking.doctor_id)
            .await?
            .ok_or(BookingError::DoctorNotFound)?;

        let slot = self.storage.slots
            .find_slot(booking.doctor_id, booking.appointment_date, booking.appointment_time)
            .await?
            .ok_or(BookingError::SlotNotFound)?;
        if slot.booked {
            return Err(BookingError::SlotAlreadyBooked);
        }

        if self.storage.appointments
            .has_active_booking(&booking.patient_email, booking.doctor_id, booking.appointment_date)
            .await?
        {
            return Err(BookingError::DuplicateBooking);
        }

        match self.storage.slots
            .mark_booked(booking.doctor_id, booking.appointment_date, booking.appointment_time)
            .await?
        {
            SlotClaim::Claimed => {}
            SlotClaim::AlreadyBooked => {
                debug!("Lost the race for slot {} {}", booking.appointment_date, booking.appointment_time);
                return Err(BookingError::SlotAlreadyBooked);
            }
            SlotClaim::NotFound => return Err(BookingError::SlotNotFound),
        }

        let now = self.clock.now();
        let new_appointment = NewAppointment {
            doctor_id: booking.doctor_id,
            patient_name: booking.patient_name.clone(),
            patient_email: booking.patient_email.clone(),
            patient_phone: booking.patient_phone.clone(),
            appointment_date: booking.appointment_date,
            appointment_time: booking.appointment_time,
            reason: booking.reason.clone(),
            status: AppointmentStatus::Pending,
            created_at: now,
            updated_at: now,
        };

        let appointment = match self.storage.appointments.insert_appointment(&new_appointment).await {
            Ok(appointment) => appointment,
            Err(e) => {
                self.release_claim(&booking).await;
                return Err(match e {
                    StoreError::Conflict(_) => BookingError::DuplicateBooking,
                    other => {
                        error!("Failed to insert appointment: {}", other);
                        BookingError::Storage(other)
                    }
                });
            }
        };

        info!(
            "Booked appointment {} with doctor {} on {} at {}",
            appointment.id, doctor.id, appointment.appointment_date, appointment.appointment_time
        );

        let notification = Notification::new(
            NotificationKind::Received,
            &appointment.patient_email,
            notification_context(&appointment, Some(&doctor)),
        );
        if let Err(e) = self.notifier.notify(notification) {
            warn!("Booking {} confirmed but the received email was not queued: {}", appointment.id, e);
        }

        Ok(BookingConfirmation {
            id: appointment.id,
            doctor_id: doctor.id,
            doctor_name: doctor.name,
            doctor_specialization: doctor.specialization,
            patient_name: appointment.patient_name,
            patient_email: appointment.patient_email,
            patient_phone: appointment.patient_phone,
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
            reason: appointment.reason,
            status: appointment.status,
        })
    }

    /// Undo of a successful `mark_booked` when the insert failed.
    async fn release_claim(&self, booking: &ValidatedBooking) {
        if let Err(e) = self.storage.slots
            .mark_free(booking.doctor_id, booking.appointment_date, booking.appointment_time)
            .await
        {
            error!(
                "Slot {} {} {} stays booked without an appointment: {}",
                booking.doctor_id, booking.appointment_date, booking.appointment_time, e
            );
        }
    }
}

fn present(value: &Option<String>) -> Option<String> {
    value.as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn parse_doctor_id(value: &Value) -> Option<DoctorId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
    .filter(|id| *id > 0)
}

fn doctor_id_present(value: &Option<Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => !s.trim().is_empty(),
        Some(_) => true,
    }
}

pub fn is_valid_email(email: &str) -> bool {
    Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")
        .map(|re| re.is_match(email) && email.len() <= 254)
        .unwrap_or(false)
}

/// Field presence first (all missing fields reported), then field formats.
pub fn validate_booking(request: &BookAppointmentRequest) -> Result<ValidatedBooking, BookingError> {
    let patient_name = present(&request.patient_name);
    let patient_email = present(&request.patient_email);
    let patient_phone = present(&request.patient_phone);
    let appointment_date = present(&request.appointment_date);
    let appointment_time = present(&request.appointment_time);

    let mut missing = Vec::new();
    if !doctor_id_present(&request.doctor_id) {
        missing.push("doctor_id");
    }
    if patient_name.is_none() {
        missing.push("patient_name");
    }
    if patient_email.is_none() {
        missing.push("patient_email");
    }
    if patient_phone.is_none() {
        missing.push("patient_phone");
    }
    if appointment_date.is_none() {
        missing.push("appointment_date");
    }
    if appointment_time.is_none() {
        missing.push("appointment_time");
    }

    let (
        Some(raw_doctor_id),
        Some(patient_name),
        Some(patient_email),
        Some(patient_phone),
        Some(raw_date),
        Some(raw_time),
    ) = (
        request.doctor_id.as_ref().filter(|_| missing.is_empty()),
        patient_name,
        patient_email,
        patient_phone,
        appointment_date,
        appointment_time,
    )
    else {
        return Err(BookingError::MissingFields(missing));
    };

    let doctor_id = parse_doctor_id(raw_doctor_id).ok_or_else(|| BookingError::InvalidField {
        field: "doctor_id",
        reason: "must be a positive integer".to_string(),
    })?;

    if !is_valid_email(&patient_email) {
        return Err(BookingError::InvalidField {
            field: "patient_email",
            reason: "not a valid email address".to_string(),
        });
    }

    let appointment_date = parse_date(&raw_date).ok_or_else(|| BookingError::InvalidField {
        field: "appointment_date",
        reason: "expected YYYY-MM-DD".to_string(),
    })?;

    let appointment_time = parse_time(&raw_time).ok_or_else(|| BookingError::InvalidField {
        field: "appointment_time",
        reason: "expected HH:MM or HH:MM:SS".to_string(),
    })?;

    Ok(ValidatedBooking {
        doctor_id,
        patient_name,
        patient_email,
        patient_phone,
        appointment_date,
        appointment_time,
        reason: present(&request.reason),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    fn request() -> BookAppointmentRequest {
        BookAppointmentRequest {
            doctor_id: Some(json!(3)),
            patient_name: Some("Jane Roe".to_string()),
            patient_email: Some("jane@example.com".to_string()),
            patient_phone: Some("555-0199".to_string()),
            appointment_date: Some("2030-01-11".to_string()),
            appointment_time: Some("09:00".to_string()),
            reason: Some("  ".to_string()),
        }
    }

    #[test]
    fn test_valid_request() {
        let booking = validate_booking(&request()).unwrap();
        assert_eq!(booking.doctor_id, 3);
        assert_eq!(booking.reason, None);

        let mut as_string = request();
        as_string.doctor_id = Some(json!("3"));
        assert_eq!(validate_booking(&as_string).unwrap().doctor_id, 3);
    }

    #[test]
    fn test_all_missing_fields_are_listed() {
        let req = BookAppointmentRequest {
            patient_name: Some("Jane Roe".to_string()),
            doctor_id: Some(Value::Null),
            ..Default::default()
        };

        assert_matches!(
            validate_booking(&req),
            Err(BookingError::MissingFields(fields))
                if fields == vec!["doctor_id", "patient_email", "patient_phone", "appointment_date", "appointment_time"]
        );
    }

    #[test]
    fn test_malformed_fields_are_named() {
        let mut req = request();
        req.patient_email = Some("jane.example.com".to_string());
        assert_matches!(validate_booking(&req), Err(BookingError::InvalidField { field: "patient_email", .. }));

        let mut req = request();
        req.appointment_time = Some("9am".to_string());
        assert_matches!(validate_booking(&req), Err(BookingError::InvalidField { field: "appointment_time", .. }));

        let mut req = request();
        req.doctor_id = Some(json!(-4));
        assert_matches!(validate_booking(&req), Err(BookingError::InvalidField { field: "doctor_id", .. }));
    }
}
