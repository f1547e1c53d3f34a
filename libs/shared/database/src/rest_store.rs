use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_models::scheduling::{
    Appointment, AppointmentId, AppointmentStatus, Doctor, DoctorDetails, DoctorId,
    NewAppointment, ReviewSubmission, Slot, StatusChange,
};

use crate::error::{StoreError, StoreResult};
use crate::store::{AppointmentStore, DoctorRemoval, DoctorStore, SlotClaim, SlotRelease, SlotStore};
use crate::supabase::SupabaseClient;

const SLOTS: &str = "/rest/v1/doctor_availability";
const DOCTORS: &str = "/rest/v1/doctors";
const APPOINTMENTS: &str = "/rest/v1/appointments";
const RETURN_ROWS: &str = "return=representation";

/// PostgREST filter operand with the caller value URL-encoded.
fn filter(op: &str, value: impl Display) -> String {
    format!("{}.{}", op, urlencoding::encode(&value.to_string()))
}

fn eq(value: impl Display) -> String {
    filter("eq", value)
}

fn time_value(time: NaiveTime) -> String {
    time.format("%H:%M:%S").to_string()
}

/// Double-quoted operand for `or=(...)` expressions.
fn quoted(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[derive(Debug, Serialize, Deserialize)]
struct SlotRow {
    doctor_id: DoctorId,
    available_date: NaiveDate,
    slot_time: NaiveTime,
    is_booked: bool,
}

impl From<SlotRow> for Slot {
    fn from(row: SlotRow) -> Self {
        Slot {
            doctor_id: row.doctor_id,
            date: row.available_date,
            time: row.slot_time,
            booked: row.is_booked,
        }
    }
}

/// Scheduling tables served through Supabase's PostgREST API.
pub struct SupabaseStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    fn slot_path(doctor_id: DoctorId, date: NaiveDate, time: NaiveTime) -> String {
        format!(
            "{}?doctor_id={}&available_date={}&slot_time={}",
            SLOTS,
            eq(doctor_id),
            eq(date),
            eq(time_value(time)),
        )
    }

    async fn patch_rows<T>(&self, path: &str, body: Value) -> StoreResult<Vec<T>>
    where T: serde::de::DeserializeOwned {
        self.supabase.request_with_headers(
            Method::PATCH,
            path,
            Some(body),
            Some(SupabaseClient::prefer(RETURN_ROWS)),
        ).await
    }
}

#[async_trait]
impl SlotStore for SupabaseStore {
    async fn list_slots(&self, doctor_id: DoctorId) -> StoreResult<Vec<Slot>> {
        let path = format!(
            "{}?doctor_id={}&order=available_date.asc,slot_time.asc",
            SLOTS,
            eq(doctor_id),
        );
        let rows: Vec<SlotRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().map(Slot::from).collect())
    }

    async fn find_slot(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<Option<Slot>> {
        let path = Self::slot_path(doctor_id, date, time);
        let rows: Vec<SlotRow> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next().map(Slot::from))
    }

    async fn mark_booked(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotClaim> {
        let path = format!("{}&is_booked=eq.false", Self::slot_path(doctor_id, date, time));
        let claimed: Vec<SlotRow> = self.patch_rows(&path, json!({ "is_booked": true })).await?;

        if !claimed.is_empty() {
            debug!("Slot {} {} claimed for doctor {}", date, time, doctor_id);
            return Ok(SlotClaim::Claimed);
        }

        // Nothing matched: either someone else holds it or it never existed.
        Ok(match self.find_slot(doctor_id, date, time).await? {
            Some(_) => SlotClaim::AlreadyBooked,
            None => SlotClaim::NotFound,
        })
    }

    async fn mark_free(
        &self,
        doctor_id: DoctorId,
        date: NaiveDate,
        time: NaiveTime,
    ) -> StoreResult<SlotRelease> {
        let path = Self::slot_path(doctor_id, date, time);
        let released: Vec<SlotRow> = self.patch_rows(&path, json!({ "is_booked": false })).await?;

        Ok(if released.is_empty() { SlotRelease::NotFound } else { SlotRelease::Released })
    }

    async fn create_slots(
        &self,
        doctor_id: DoctorId,
        slots: &[(NaiveDate, NaiveTime)],
    ) -> StoreResult<usize> {
        if slots.is_empty() {
            return Ok(0);
        }

        let rows: Vec<SlotRow> = slots.iter()
            .map(|(date, time)| SlotRow {
                doctor_id,
                available_date: *date,
                slot_time: *time,
                is_booked: false,
            })
            .collect();

        let path = format!("{}?on_conflict=doctor_id,available_date,slot_time", SLOTS);
        let inserted: Vec<SlotRow> = self.supabase.request_with_headers(
            Method::POST,
            &path,
            Some(serde_json::to_value(&rows)?),
            Some(SupabaseClient::prefer("resolution=ignore-duplicates,return=representation")),
        ).await?;

        info!("Inserted {} of {} slots for doctor {}", inserted.len(), slots.len(), doctor_id);
        Ok(inserted.len())
    }

    async fn delete_unbooked_slots(&self, doctor_id: DoctorId) -> StoreResult<usize> {
        let path = format!("{}?doctor_id={}&is_booked=eq.false", SLOTS, eq(doctor_id));
        let deleted: Vec<SlotRow> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            None,
            Some(SupabaseClient::prefer(RETURN_ROWS)),
        ).await?;
        Ok(deleted.len())
    }
}

#[async_trait]
impl DoctorStore for SupabaseStore {
    async fn list_doctors(&self) -> StoreResult<Vec<Doctor>> {
        let path = format!("{}?order=created_at.desc,id.desc", DOCTORS);
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn get_doctor(&self, doctor_id: DoctorId) -> StoreResult<Option<Doctor>> {
        let path = format!("{}?id={}", DOCTORS, eq(doctor_id));
        let rows: Vec<Doctor> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_conflicting_doctor(
        &self,
        email: &str,
        phone: &str,
        exclude: Option<DoctorId>,
    ) -> StoreResult<Option<Doctor>> {
        let any_of = format!("(email.eq.{},phone.eq.{})", quoted(email), quoted(phone));
        let mut path = format!("{}?or={}&limit=1", DOCTORS, urlencoding::encode(&any_of));
        if let Some(id) = exclude {
            path.push_str(&format!("&id={}", filter("neq", id)));
        }

        let rows: Vec<Doctor> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn insert_doctor(
        &self,
        details: &DoctorDetails,
        created_at: DateTime<Utc>,
    ) -> StoreResult<Doctor> {
        let mut body = serde_json::to_value(details)?;
        body["created_at"] = json!(created_at.to_rfc3339());

        let rows: Vec<Doctor> = self.supabase.request_with_headers(
            Method::POST,
            DOCTORS,
            Some(body),
            Some(SupabaseClient::prefer(RETURN_ROWS)),
        ).await?;

        rows.into_iter().next().ok_or_else(|| StoreError::Api {
            status: 201,
            message: "Doctor insert returned no rows".to_string(),
        })
    }

    async fn update_doctor(
        &self,
        doctor_id: DoctorId,
        details: &DoctorDetails,
    ) -> StoreResult<Option<Doctor>> {
        let path = format!("{}?id={}", DOCTORS, eq(doctor_id));
        let rows: Vec<Doctor> = self.patch_rows(&path, serde_json::to_value(details)?).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_doctor(&self, doctor_id: DoctorId) -> StoreResult<DoctorRemoval> {
        if self.get_doctor(doctor_id).await?.is_none() {
            return Ok(DoctorRemoval::NotFound);
        }

        // A refused delete must leave every slot in place.
        let booked_path = format!(
            "{}?doctor_id={}&is_booked=eq.true&select=doctor_id&limit=1",
            SLOTS,
            eq(doctor_id),
        );
        let booked: Vec<Value> = self.supabase.request(Method::GET, &booked_path, None).await?;
        if !booked.is_empty() {
            return Ok(DoctorRemoval::HasBookedSlots);
        }

        self.delete_unbooked_slots(doctor_id).await?;

        let path = format!("{}?id={}", DOCTORS, eq(doctor_id));
        self.supabase.execute(Method::DELETE, &path, None).await?;
        Ok(DoctorRemoval::Deleted)
    }

    async fn record_completed_appointment(&self, doctor_id: DoctorId) -> StoreResult<()> {
        self.supabase.execute(
            Method::POST,
            "/rest/v1/rpc/increment_doctor_appointments",
            Some(json!({ "p_doctor_id": doctor_id })),
        ).await
    }
}

#[async_trait]
impl AppointmentStore for SupabaseStore {
    async fn insert_appointment(&self, appointment: &NewAppointment) -> StoreResult<Appointment> {
        let body = serde_json::to_value(appointment)?;

        let rows: Vec<Appointment> = self.supabase.request_with_headers(
            Method::POST,
            APPOINTMENTS,
            Some(body),
            Some(SupabaseClient::prefer(RETURN_ROWS)),
        ).await?;

        rows.into_iter().next().ok_or_else(|| StoreError::Api {
            status: 201,
            message: "Appointment insert returned no rows".to_string(),
        })
    }

    async fn get_appointment(&self, appointment_id: AppointmentId) -> StoreResult<Option<Appointment>> {
        let path = format!("{}?id={}", APPOINTMENTS, eq(appointment_id));
        let rows: Vec<Appointment> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(rows.into_iter().next())
    }

    async fn list_appointments(
        &self,
        status: Option<AppointmentStatus>,
    ) -> StoreResult<Vec<Appointment>> {
        let mut path = format!("{}?order=appointment_date.desc,appointment_time.desc", APPOINTMENTS);
        if let Some(status) = status {
            path.push_str(&format!("&status={}", eq(status)));
        }
        self.supabase.request(Method::GET, &path, None).await
    }

    async fn has_active_booking(
        &self,
        patient_email: &str,
        doctor_id: DoctorId,
        date: NaiveDate,
    ) -> StoreResult<bool> {
        let path = format!(
            "{}?select=id&patient_email={}&doctor_id={}&appointment_date={}&status=neq.rejected&limit=1",
            APPOINTMENTS,
            eq(patient_email),
            eq(doctor_id),
            eq(date),
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, None).await?;
        Ok(!rows.is_empty())
    }

    async fn update_status(
        &self,
        appointment_id: AppointmentId,
        expected: AppointmentStatus,
        change: &StatusChange,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!("{}?id={}&status={}", APPOINTMENTS, eq(appointment_id), eq(expected));
        let rows: Vec<Appointment> = self.patch_rows(&path, serde_json::to_value(change)?).await?;
        Ok(rows.into_iter().next())
    }

    async fn record_review(
        &self,
        appointment_id: AppointmentId,
        review_token: &str,
        review: &ReviewSubmission,
    ) -> StoreResult<Option<Appointment>> {
        let path = format!(
            "{}?id={}&review_token={}&status=eq.completed&reviewed_at=is.null",
            APPOINTMENTS,
            eq(appointment_id),
            eq(review_token),
        );
        let rows: Vec<Appointment> = self.patch_rows(&path, serde_json::to_value(review)?).await?;
        Ok(rows.into_iter().next())
    }
}
