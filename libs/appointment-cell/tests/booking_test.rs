mod common;

use std::sync::Arc;

use assert_matches::assert_matches;
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};

use appointment_cell::BookingError;
use notification_cell::test_utils::RecordingNotifier;
use notification_cell::NotificationKind;
use shared_database::{
    AppointmentStore, InMemoryStore, Storage, StoreError, StoreResult,
};
use shared_models::scheduling::{
    Appointment, AppointmentId, AppointmentStatus, DoctorId, NewAppointment, ReviewSubmission,
    StatusChange,
};

use common::{booking_request, Harness};

#[tokio::test]
async fn test_booking_claims_slot_and_queues_received_email() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00", "10:00"]).await;

    let confirmation = h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.unwrap();

    assert_eq!(confirmation.status, AppointmentStatus::Pending);
    assert_eq!(confirmation.doctor_name, "Ada Smith");
    assert!(h.slot_booked(doctor.id, "09:00").await);
    assert!(!h.slot_booked(doctor.id, "10:00").await);

    let sent = h.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].kind, NotificationKind::Received);
    assert_eq!(sent[0].recipient_email, "jane@example.com");
    assert_eq!(sent[0].context.doctor_name, "Ada Smith");
}

#[tokio::test]
async fn test_booking_inside_lead_time_is_too_soon() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    // 2030-01-11 08:00:01, so 09:00 is just under an hour away.
    h.clock.advance(Duration::hours(24) + Duration::seconds(1));
    assert_matches!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await,
        Err(BookingError::TooSoon)
    );

    // Exactly one hour ahead is allowed.
    h.clock.advance(Duration::seconds(-1));
    assert!(h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.is_ok());
}

#[tokio::test]
async fn test_unknown_doctor_and_slot() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    assert_matches!(
        h.booking.book(booking_request(doctor.id + 100, "jane@example.com", "09:00")).await,
        Err(BookingError::DoctorNotFound)
    );
    assert_matches!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "09:30")).await,
        Err(BookingError::SlotNotFound)
    );
    assert!(h.notifier.sent().is_empty());
}

#[tokio::test]
async fn test_booked_slot_is_refused() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.unwrap();

    assert_matches!(
        h.booking.book(booking_request(doctor.id, "john@example.com", "09:00")).await,
        Err(BookingError::SlotAlreadyBooked)
    );
}

#[tokio::test]
async fn test_one_booking_per_patient_doctor_and_day() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00", "10:00", "11:00"]).await;

    let first = h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.unwrap();
    assert_matches!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "10:00")).await,
        Err(BookingError::DuplicateBooking)
    );
    assert!(!h.slot_booked(doctor.id, "10:00").await);

    // Cancelled still counts against the day.
    h.lifecycle.transition(first.id, "approved", None).await.unwrap();
    h.lifecycle.transition(first.id, "cancelled", None).await.unwrap();
    assert_matches!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "10:00")).await,
        Err(BookingError::DuplicateBooking)
    );

    // A different doctor on the same day is fine.
    let other = h.seed_doctor("grace@clinic.test", &["09:00"]).await;
    assert!(h.booking.book(booking_request(other.id, "jane@example.com", "09:00")).await.is_ok());
}

#[tokio::test]
async fn test_rejected_booking_frees_the_day() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00", "10:00"]).await;

    let first = h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.unwrap();
    h.lifecycle.transition(first.id, "rejected", None).await.unwrap();

    let second = h.booking.book(booking_request(doctor.id, "jane@example.com", "10:00")).await.unwrap();
    assert_ne!(second.id, first.id);
    assert!(!h.slot_booked(doctor.id, "09:00").await);
}

#[tokio::test]
async fn test_validation_reports_every_missing_field() {
    let h = Harness::new();
    let mut request = booking_request(1, "jane@example.com", "09:00");
    request.patient_phone = None;
    request.appointment_date = Some("   ".to_string());

    let err = h.booking.book(request).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "All required fields must be provided: patient_phone, appointment_date"
    );
}

#[tokio::test]
async fn test_notification_failure_does_not_fail_booking() {
    let h = Harness::with(Storage::in_memory(), Arc::new(RecordingNotifier::failing()));
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    assert!(h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await.is_ok());
    assert!(h.slot_booked(doctor.id, "09:00").await);
}

#[tokio::test]
async fn test_concurrent_requests_for_one_slot() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    let attempts = (0..10).map(|i| {
        h.booking.book(booking_request(doctor.id, &format!("patient{}@example.com", i), "09:00"))
    });
    let results = futures::future::join_all(attempts).await;

    let successes = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1);
    for result in results.iter().filter(|r| r.is_err()) {
        assert_matches!(result, Err(BookingError::SlotAlreadyBooked));
    }

    let active = h.storage.appointments.list_appointments(Some(AppointmentStatus::Pending)).await.unwrap();
    assert_eq!(active.len(), 1);
}

#[tokio::test]
async fn test_concurrent_requests_same_patient_same_day() {
    let h = Harness::new();
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00", "10:00"]).await;

    let (a, b) = tokio::join!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")),
        h.booking.book(booking_request(doctor.id, "jane@example.com", "10:00")),
    );

    assert_eq!([a.is_ok(), b.is_ok()].iter().filter(|ok| **ok).count(), 1);
    let booked = [h.slot_booked(doctor.id, "09:00").await, h.slot_booked(doctor.id, "10:00").await];
    assert_eq!(booked.iter().filter(|b| **b).count(), 1);
}

/// Appointment table whose inserts always fail.
struct BrokenInserts(Arc<InMemoryStore>);

#[async_trait]
impl AppointmentStore for BrokenInserts {
    async fn insert_appointment(&self, _: &NewAppointment) -> StoreResult<Appointment> {
        Err(StoreError::Api { status: 503, message: "unavailable".to_string() })
    }

    async fn get_appointment(&self, id: AppointmentId) -> StoreResult<Option<Appointment>> {
        self.0.get_appointment(id).await
    }

    async fn list_appointments(&self, status: Option<AppointmentStatus>) -> StoreResult<Vec<Appointment>> {
        self.0.list_appointments(status).await
    }

    async fn has_active_booking(&self, email: &str, doctor_id: DoctorId, date: NaiveDate) -> StoreResult<bool> {
        self.0.has_active_booking(email, doctor_id, date).await
    }

    async fn update_status(
        &self,
        id: AppointmentId,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> StoreResult<Option<Appointment>> {
        self.0.update_status(id, expected, change).await
    }

    async fn record_review(
        &self,
        id: AppointmentId,
        token: &str,
        review: &ReviewSubmission,
    ) -> StoreResult<Option<Appointment>> {
        self.0.record_review(id, token, review).await
    }
}

#[tokio::test]
async fn test_failed_insert_releases_the_slot() {
    let backend = Arc::new(InMemoryStore::new());
    let storage = Storage {
        slots: backend.clone(),
        doctors: backend.clone(),
        appointments: Arc::new(BrokenInserts(backend)),
    };
    let h = Harness::with(storage, Arc::new(RecordingNotifier::new()));
    let doctor = h.seed_doctor("ada@clinic.test", &["09:00"]).await;

    assert_matches!(
        h.booking.book(booking_request(doctor.id, "jane@example.com", "09:00")).await,
        Err(BookingError::Storage(StoreError::Api { status: 503, .. }))
    );
    assert!(!h.slot_booked(doctor.id, "09:00").await);
    assert!(h.notifier.sent().is_empty());
}
