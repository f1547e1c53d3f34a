#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;

use appointment_cell::{BookAppointmentRequest, BookingService, LifecycleService, ReviewService, ReviewTokenSigner};
use notification_cell::test_utils::RecordingNotifier;
use notification_cell::Notifier;
use shared_database::Storage;
use shared_models::scheduling::{Doctor, DoctorDetails};
use shared_utils::clock::FixedClock;
use shared_utils::test_utils::{date, fixed_clock, test_now, time, TestConfig};

pub const SLOT_DATE: &str = "2030-01-11";

pub struct Harness {
    pub storage: Storage,
    pub clock: Arc<FixedClock>,
    pub notifier: Arc<RecordingNotifier>,
    pub signer: Arc<ReviewTokenSigner>,
    pub booking: BookingService,
    pub lifecycle: LifecycleService,
    pub reviews: ReviewService,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(Storage::in_memory(), Arc::new(RecordingNotifier::new()))
    }

    pub fn with(storage: Storage, notifier: Arc<RecordingNotifier>) -> Self {
        let config = TestConfig::default();
        let clock = fixed_clock();
        let signer = Arc::new(ReviewTokenSigner::new(&config.review_token_secret));
        let dyn_notifier: Arc<dyn Notifier> = notifier.clone();

        Self {
            booking: BookingService::new(storage.clone(), clock.clone(), dyn_notifier.clone()),
            lifecycle: LifecycleService::new(
                config.to_arc(),
                storage.clone(),
                clock.clone(),
                dyn_notifier,
                signer.clone(),
            ),
            reviews: ReviewService::new(storage.clone(), clock.clone(), signer.clone()),
            storage,
            clock,
            notifier,
            signer,
        }
    }

    /// Doctor with free slots on 2030-01-11 at the given times.
    pub async fn seed_doctor(&self, email: &str, times: &[&str]) -> Doctor {
        let details = DoctorDetails {
            name: "Ada Smith".to_string(),
            specialization: "Cardiology".to_string(),
            email: email.to_string(),
            phone: format!("phone-{}", email),
            experience: 4.0,
        };
        let doctor = self.storage.doctors.insert_doctor(&details, test_now()).await.unwrap();

        let slots: Vec<_> = times.iter().map(|t| (date(SLOT_DATE), time(t))).collect();
        self.storage.slots.create_slots(doctor.id, &slots).await.unwrap();
        doctor
    }

    pub async fn slot_booked(&self, doctor_id: i64, at: &str) -> bool {
        self.storage.slots
            .find_slot(doctor_id, date(SLOT_DATE), time(at))
            .await
            .unwrap()
            .unwrap()
            .booked
    }
}

pub fn booking_request(doctor_id: i64, email: &str, at: &str) -> BookAppointmentRequest {
    BookAppointmentRequest {
        doctor_id: Some(json!(doctor_id)),
        patient_name: Some("Jane Roe".to_string()),
        patient_email: Some(email.to_string()),
        patient_phone: Some("555-0199".to_string()),
        appointment_date: Some(SLOT_DATE.to_string()),
        appointment_time: Some(at.to_string()),
        reason: Some("Annual checkup".to_string()),
    }
}
