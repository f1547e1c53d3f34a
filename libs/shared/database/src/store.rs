use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use shared_models::scheduling::{
    Appointment, AppointmentId, AppointmentStatus, Doctor, DoctorDetails, DoctorId,
    NewAppointment, ReviewSubmission, Slot, StatusChange,
};

use crate::error::StoreResult;

/// Outcome of the conditional "set booked = true where booked = false" write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotClaim {
    Claimed,
    AlreadyBooked,
    NotFound,
}

/// Outcome of freeing a slot. Freeing an already free slot is `Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRelease {
    Released,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoctorRemoval {
    Deleted,
    HasBookedSlots,
    NotFound,
}

/// Per-doctor availability records. The booked flag is the single point of
/// serialization between concurrent bookings.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Slots ordered by date, then time.
    async fn list_slots(&self, doctor_id: DoctorId) -> StoreResult<Vec<Slot>>;

    async fn find_slot(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Slot>>;

    async fn mark_booked(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotClaim>;

    async fn mark_free(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotRelease>;

    /// Inserts the given pairs, skipping ones the doctor already has. Returns
    /// the number of rows actually inserted.
    async fn create_slots(
        &self,
        doctor_id: DoctorId,
        slots: &[(NaiveDate, NaiveTime)],
    ) -> StoreResult<usize>;

    /// Removes every free slot of the doctor; booked slots stay.
    async fn delete_unbooked_slots(&self, doctor_id: DoctorId) -> StoreResult<usize>;
}

#[async_trait]
pub trait DoctorStore: Send + Sync {
    /// Newest doctors first.
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>>;

    async fn get_doctor(&self, doctor_id: DoctorId) -> StoreResult<Option<Doctor>>;

    /// A doctor other than `exclude` already using the email or phone.
    async fn find_conflicting_doctor(
        &self,
        email: &str,
        phone: &str,
        exclude: Option<DoctorId>,
    ) -> StoreResult<Option<Doctor>>;

    async fn insert_doctor(
        &self,
        details: &DoctorDetails,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Doctor>;

    async fn update_doctor(
        &self,
        doctor_id: DoctorId,
        details: &DoctorDetails,
    ) -> StoreResult<Option<Doctor>>;

    /// Deletes the doctor and its slots unless any slot is booked.
    async fn delete_doctor(&self, doctor_id: DoctorId) -> StoreResult<DoctorRemoval>;

    /// Bumps both the completed and total appointment counters.
    async fn record_completed_appointment(&self, doctor_id: DoctorId) -> StoreResult<()>;
}

#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Fails with `StoreError::Conflict` when the patient already holds a
    /// non-rejected appointment with the doctor that day, or another active
    /// appointment holds the same slot.
    async fn insert_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment>;

    async fn get_appointment(&self, appointment_id: AppointmentId) -> StoreResult<Option<Appointment>>;

    /// Most recent date and time first.
    async fn list_appointments(
        &self,
        status: Option<AppointmentStatus>,
    ) -> StoreResult<Vec<Appointment>>;

    /// Whether the patient holds any non-rejected appointment with the doctor on `date`.
    async fn has_active_booking(
        &self,
        patient_email: &str,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> StoreResult<bool>;

    /// Applies `change` only if the stored status equals `expected`. `None`
    /// when the appointment is missing or its status moved on.
    async fn update_status(
        &self,
        appointment_id: AppointmentId,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> StoreResult<Option<Appointment>>;

    /// Stores the review once, only for a completed appointment holding
    /// `review_token` that has not been reviewed yet.
    async fn record_review(
        &self,
        appointment_id: AppointmentId,
        review_token: &str,
        review: &ReviewSubmission,
    ) -> StoreResult<Option<Appointment>>;
}
