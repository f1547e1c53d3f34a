use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use shared_models::scheduling::{
    Appointment, AppointmentId, AppointmentStatus, Doctor, DoctorDetails, DoctorId,
    NewAppointment, ReviewSubmission, Slot, StatusChange,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{AppointmentStore, DoctorRemoval, DoctorStore, SlotClaim, SlotRelease, SlotStore};

type SlotKey = (DoctorId, NaiveDate, NaiveTime);

#[derive(Default)]
struct Tables {
    doctors: BTreeMap<DoctorId, Doctor>,
    slots: BTreeMap<SlotKey, bool>,
    appointments: BTreeMap<AppointmentId, Appointment>,
    next_doctor_id: DoctorId,
    next_appointment_id: AppointmentId,
}

/// Process-local backend with the same row-level guarantees as the database:
/// every operation runs under one lock, so conditional writes are atomic.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn to_slot(key: &SlotKey, booked: bool) -> Slot {
    Slot { doctor_id: key.0, date: key.1, time: key.2, booked }
}

#[async_trait]
impl SlotStore for InMemoryStore {
    async fn list_slots(&self, doctor_id: DoctorId) -> StoreResult<Vec<Slot>> {
        let tables = self.tables.lock().await;
        Ok(tables.slots.iter()
            .filter(|(key, _)| key.0 == doctor_id)
            .map(|(key, booked)| to_slot(key, *booked))
            .collect())
    }

    async fn find_slot(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Slot>> {
        let key = (doctor_id, date, time);
        let tables = self.tables.lock().await;
        Ok(tables.slots.get(&key).map(|booked| to_slot(&key, *booked)))
    }

    async fn mark_booked(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotClaim> {
        let mut tables = self.tables.lock().await;
        let claim = match tables.slots.get_mut(&(doctor_id, date, time)) {
            None => SlotClaim::NotFound,
            Some(booked) if *booked => SlotClaim::AlreadyBooked,
            Some(booked) => {
                *booked = true;
                SlotClaim::Claimed
            }
        };
        debug!("mark_booked {} {} {} -> {:?}", doctor_id, date, time, claim);
        Ok(claim)
    }

    async fn mark_free(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotRelease> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.slots.get_mut(&(doctor_id, date, time)) {
            None => SlotRelease::NotFound,
            Some(booked) => {
                *booked = false;
                SlotRelease::Released
            }
        })
    }

    async fn create_slots(
        &self,
        doctor_id: DoctorId,
        slots: &[(NaiveDate, NaiveTime)],
    ) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let mut inserted = 0;
        for (date, time) in slots {
            let key = (doctor_id, *date, *time);
            if !tables.slots.contains_key(&key) {
                tables.slots.insert(key, false);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    async fn delete_unbooked_slots(&self, doctor_id: DoctorId) -> StoreResult<usize> {
        let mut tables = self.tables.lock().await;
        let before = tables.slots.len();
        tables.slots.retain(|key, booked| key.0 != doctor_id || *booked);
        Ok(before - tables.slots.len())
    }
}

#[async_trait]
impl DoctorStore for InMemoryStore {
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let tables = self.tables.lock().await;
        let mut doctors: Vec<Doctor> = tables.doctors.values().cloned().collect();
        doctors.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(doctors)
    }

    async fn get_doctor(&self, doctor_id: DoctorId) -> StoreResult<Option<Doctor>> {
        let tables = self.tables.lock().await;
        Ok(tables.doctors.get(&doctor_id).cloned())
    }

    async fn find_conflicting_doctor(
        &self,
        email: &str,
        phone: &str,
        exclude: Option<DoctorId>,
    ) -> StoreResult<Option<Doctor>> {
        let tables = self.tables.lock().await;
        Ok(tables.doctors.values()
            .filter(|doctor| Some(doctor.id) != exclude)
            .find(|doctor| doctor.email == email || doctor.phone == phone)
            .cloned())
    }

    async fn insert_doctor(
        &self,
        details: &DoctorDetails,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Doctor> {
        let mut tables = self.tables.lock().await;
        if tables.doctors.values().any(|d| d.email == details.email || d.phone == details.phone) {
            return Err(StoreError::Conflict("doctors_email_or_phone_key".to_string()));
        }

        tables.next_doctor_id += 1;
        let doctor = Doctor {
            id: tables.next_doctor_id,
            name: details.name.clone(),
            specialization: details.specialization.clone(),
            email: details.email.clone(),
            phone: details.phone.clone(),
            experience: details.experience,
            completed_appointments: 0,
            total_appointments: 0,
            created_at,
        };
        tables.doctors.insert(doctor.id, doctor.clone());
        Ok(doctor)
    }

    async fn update_doctor(
        &self,
        doctor_id: DoctorId,
        details: &DoctorDetails,
    ) -> StoreResult<Option<Doctor>> {
        let mut tables = self.tables.lock().await;
        if tables.doctors.values()
            .any(|d| d.id != doctor_id && (d.email == details.email || d.phone == details.phone))
        {
            return Err(StoreError::Conflict("doctors_email_or_phone_key".to_string()));
        }

        Ok(tables.doctors.get_mut(&doctor_id).map(|doctor| {
            doctor.name = details.name.clone();
            doctor.specialization = details.specialization.clone();
            doctor.email = details.email.clone();
            doctor.phone = details.phone.clone();
            doctor.experience = details.experience;
            doctor.clone()
        }))
    }

    async fn delete_doctor(&self, doctor_id: DoctorId) -> StoreResult<DoctorRemoval> {
        let mut tables = self.tables.lock().await;
        if !tables.doctors.contains_key(&doctor_id) {
            return Ok(DoctorRemoval::NotFound);
        }
        if tables.slots.iter().any(|(key, booked)| key.0 == doctor_id && *booked) {
            return Ok(DoctorRemoval::HasBookedSlots);
        }

        tables.slots.retain(|key, _| key.0 != doctor_id);
        tables.doctors.remove(&doctor_id);
        Ok(DoctorRemoval::Deleted)
    }

    async fn record_completed_appointment(&self, doctor_id: DoctorId) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        let doctor = tables.doctors.get_mut(&doctor_id)
            .ok_or_else(|| StoreError::NotFound(format!("doctor {}", doctor_id)))?;
        doctor.completed_appointments += 1;
        doctor.total_appointments += 1;
        Ok(())
    }
}

#[async_trait]
impl AppointmentStore for InMemoryStore {
    async fn insert_appointment(&self, new: &NewAppointment) -> StoreResult<Appointment> {
        let mut tables = self.tables.lock().await;

        let duplicate_day = tables.appointments.values().any(|a| {
            a.patient_email == new.patient_email
                && a.doctor_id == new.doctor_id
                && a.appointment_date == new.appointment_date
                && a.status != AppointmentStatus::Rejected
        });
        if duplicate_day {
            return Err(StoreError::Conflict("appointments_patient_doctor_day_key".to_string()));
        }

        let slot_taken = tables.appointments.values().any(|a| {
            a.doctor_id == new.doctor_id
                && a.appointment_date == new.appointment_date
                && a.appointment_time == new.appointment_time
                && a.status.holds_slot()
        });
        if slot_taken {
            return Err(StoreError::Conflict("appointments_active_slot_key".to_string()));
        }

        tables.next_appointment_id += 1;
        let appointment = Appointment {
            id: tables.next_appointment_id,
            doctor_id: new.doctor_id,
            patient_name: new.patient_name.clone(),
            patient_email: new.patient_email.clone(),
            patient_phone: new.patient_phone.clone(),
            appointment_date: new.appointment_date,
            appointment_time: new.appointment_time,
            reason: new.reason.clone(),
            status: new.status,
            created_at: new.created_at,
            updated_at: new.updated_at,
            review_token: None,
            review_token_sent_at: None,
            reviewed_at: None,
            review_rating: None,
            review_text: None,
        };
        tables.appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn get_appointment(&self, appointment_id: AppointmentId) -> StoreResult<Option<Appointment>> {
        let tables = self.tables.lock().await;
        Ok(tables.appointments.get(&appointment_id).cloned())
    }

    async fn list_appointments(
        &self,
        status: Option<AppointmentStatus>,
    ) -> StoreResult<Vec<Appointment>> {
        let tables = self.tables.lock().await;
        let mut appointments: Vec<Appointment> = tables.appointments.values()
            .filter(|a| status.map_or(true, |s| a.status == s))
            .cloned()
            .collect();
        appointments.sort_by(|a, b| {
            b.appointment_date.cmp(&a.appointment_date)
                .then(b.appointment_time.cmp(&a.appointment_time))
        });
        Ok(appointments)
    }

    async fn has_active_booking(
        &self,
        patient_email: &str,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.appointments.values().any(|a| {
            a.patient_email == patient_email
                && a.doctor_id == doctor_id
                && a.appointment_date == date
                && a.status != AppointmentStatus::Rejected
        }))
    }

    async fn update_status(
        &self,
        appointment_id: AppointmentId,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> StoreResult<Option<Appointment>> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.appointments.get_mut(&appointment_id) {
            Some(appointment) if appointment.status == expected => {
                appointment.status = change.status;
                appointment.review_token = change.review_token.clone();
                appointment.review_token_sent_at = change.review_token_sent_at;
                appointment.updated_at = change.updated_at;
                Some(appointment.clone())
            }
            _ => None,
        })
    }

    async fn record_review(
        &self,
        appointment_id: AppointmentId,
        review_token: &str,
        review: &ReviewSubmission,
    ) -> StoreResult<Option<Appointment>> {
        let mut tables = self.tables.lock().await;
        Ok(match tables.appointments.get_mut(&appointment_id) {
            Some(appointment)
                if appointment.status == AppointmentStatus::Completed
                    && appointment.review_token.as_deref() == Some(review_token)
                    && appointment.reviewed_at.is_none() =>
            {
                appointment.review_rating = Some(review.review_rating);
                appointment.review_text = review.review_text.clone();
                appointment.reviewed_at = Some(review.reviewed_at);
                Some(appointment.clone())
            }
            _ => None,
        })
    }
}
