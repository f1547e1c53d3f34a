use notification_cell::NotificationContext;
use shared_models::scheduling::{Appointment, Doctor};

/// Email template values for an appointment. A missing doctor leaves the
/// doctor fields generic.
pub fn notification_context(appointment: &Appointment, doctor: Option<&Doctor>) -> NotificationContext {
    NotificationContext {
        patient_name: appointment.patient_name.clone(),
        doctor_name: doctor.map_or_else(|| "your doctor".to_string(), |d| d.name.clone()),
        doctor_specialization: doctor.map(|d| d.specialization.clone()),
        date: appointment.appointment_date,
        time: appointment.appointment_time,
        reason: appointment.reason.clone(),
        rejection_reason: None,
        review_link: None,
    }
}
