use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, info, instrument, warn};

use shared_database::{DoctorRemoval, Storage, StoreError};
use shared_models::scheduling::{parse_date, parse_time, DoctorDetails, DoctorId};
use shared_utils::clock::Clock;

use crate::models::{DoctorDeleted, DoctorError, DoctorRequest, DoctorSaved, SlotDayRequest};

/// Admin-side doctor management: profile details plus the slot calendar.
pub struct DoctorService {
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl DoctorService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    #[instrument(skip(self, request), fields(email = ?request.email))]
    pub async fn create_doctor(&self, request: DoctorRequest) -> Result<DoctorSaved, DoctorError> {
        let (details, slots) = validate_request(&request)?;

        if self.storage.doctors.find_conflicting_doctor(&details.email, &details.phone, None).await?.is_some() {
            return Err(DoctorError::DuplicateContact);
        }

        let doctor = self.storage.doctors
            .insert_doctor(&details, self.clock.now())
            .await
            .map_err(conflict_as_duplicate)?;

        let slots_created = self.storage.slots.create_slots(doctor.id, &slots).await?;
        info!("Created doctor {} with {} slots", doctor.id, slots_created);

        Ok(DoctorSaved {
            experience_label: doctor.experience_label(),
            doctor,
            slots_created,
        })
    }

    /// Replaces the profile and the free part of the calendar. Booked slots
    /// survive; requested pairs that collide with them are skipped.
    #[instrument(skip(self, request))]
    pub async fn update_doctor(
        &self,
        doctor_id: DoctorId,
        request: DoctorRequest,
    ) -> Result<DoctorSaved, DoctorError> {
        let (details, slots) = validate_request(&request)?;

        if self.storage.doctors.get_doctor(doctor_id).await?.is_none() {
            return Err(DoctorError::NotFound);
        }

        if self.storage.doctors
            .find_conflicting_doctor(&details.email, &details.phone, Some(doctor_id))
            .await?
            .is_some()
        {
            return Err(DoctorError::DuplicateContact);
        }

        let doctor = self.storage.doctors
            .update_doctor(doctor_id, &details)
            .await
            .map_err(conflict_as_duplicate)?
            .ok_or(DoctorError::NotFound)?;

        let removed = self.storage.slots.delete_unbooked_slots(doctor_id).await?;
        let slots_created = self.storage.slots.create_slots(doctor_id, &slots).await?;
        debug!("Doctor {}: removed {} free slots, created {}", doctor_id, removed, slots_created);

        Ok(DoctorSaved {
            experience_label: doctor.experience_label(),
            doctor,
            slots_created,
        })
    }

    #[instrument(skip(self))]
    pub async fn delete_doctor(&self, doctor_id: DoctorId) -> Result<DoctorDeleted, DoctorError> {
        let doctor = self.storage.doctors
            .get_doctor(doctor_id)
            .await?
            .ok_or(DoctorError::NotFound)?;

        match self.storage.doctors.delete_doctor(doctor_id).await? {
            DoctorRemoval::Deleted => {
                info!("Deleted doctor {}", doctor_id);
                Ok(DoctorDeleted { doctor_id, name: doctor.name })
            }
            DoctorRemoval::HasBookedSlots => {
                warn!("Refusing to delete doctor {} with booked slots", doctor_id);
                Err(DoctorError::HasBookedSlots)
            }
            DoctorRemoval::NotFound => Err(DoctorError::NotFound),
        }
    }
}

fn conflict_as_duplicate(error: StoreError) -> DoctorError {
    match error {
        StoreError::Conflict(_) => DoctorError::DuplicateContact,
        other => DoctorError::Storage(other),
    }
}

fn required(value: &Option<String>, field: &'static str, missing: &mut Vec<&'static str>) -> String {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => v.to_string(),
        _ => {
            missing.push(field);
            String::new()
        }
    }
}

pub(crate) fn validate_request(
    request: &DoctorRequest,
) -> Result<(DoctorDetails, Vec<(NaiveDate, NaiveTime)>), DoctorError> {
    let mut missing = Vec::new();
    let name = required(&request.name, "name", &mut missing);
    let specialization = required(&request.specialization, "specialization", &mut missing);
    let email = required(&request.email, "email", &mut missing);
    let phone = required(&request.phone, "phone", &mut missing);
    if request.experience.is_none() {
        missing.push("experience");
    }
    if !missing.is_empty() {
        return Err(DoctorError::MissingFields(missing));
    }

    let experience = request.experience.unwrap_or_default();
    if !experience.is_finite() || experience < 0.0 {
        return Err(DoctorError::InvalidExperience);
    }

    let slots = expand_slots(request.slots.as_deref().unwrap_or_default())?;

    Ok((
        DoctorDetails { name, specialization, email, phone, experience },
        slots,
    ))
}

fn expand_slots(days: &[SlotDayRequest]) -> Result<Vec<(NaiveDate, NaiveTime)>, DoctorError> {
    let mut pairs = Vec::new();
    for day in days {
        let date = parse_date(&day.date).ok_or_else(|| DoctorError::InvalidSlot {
            field: "date",
            value: day.date.clone(),
        })?;
        for raw in &day.time {
            let time = parse_time(raw).ok_or_else(|| DoctorError::InvalidSlot {
                field: "time",
                value: raw.clone(),
            })?;
            pairs.push((date, time));
        }
    }
    pairs.sort();
    pairs.dedup();
    Ok(pairs)
}
