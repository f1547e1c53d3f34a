use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use doctor_cell::{AvailabilityService, DoctorError, DoctorStatus, StatusFilter};
use shared_database::{Storage, StoreError};
use shared_models::scheduling::{AppointmentStatus, Doctor, DoctorId};

use crate::models::{AppointmentWithDoctor, DashboardStats};

/// Read-only admin views over doctors and appointments.
pub struct AdminViewService {
    storage: Storage,
    availability: Arc<AvailabilityService>,
}

impl AdminViewService {
    pub fn new(storage: Storage, availability: Arc<AvailabilityService>) -> Self {
        Self { storage, availability }
    }

    pub async fn dashboard_stats(&self) -> Result<DashboardStats, DoctorError> {
        let doctors = self.availability.list_doctors(StatusFilter::All).await?;
        let appointments = self.storage.appointments.list_appointments(None).await?;

        let doctors_in = |status: DoctorStatus| doctors.iter().filter(|d| d.status == status).count();
        let appointments_in = |status: AppointmentStatus| {
            appointments.iter().filter(|a| a.status == status).count()
        };

        Ok(DashboardStats {
            total_doctors: doctors.len(),
            available_doctors: doctors_in(DoctorStatus::Available),
            busy_doctors: doctors_in(DoctorStatus::Busy),
            unavailable_doctors: doctors_in(DoctorStatus::Unavailable),
            total_appointments: appointments.len(),
            pending_appointments: appointments_in(AppointmentStatus::Pending),
            approved_appointments: appointments_in(AppointmentStatus::Approved),
            rejected_appointments: appointments_in(AppointmentStatus::Rejected),
            completed_appointments: appointments_in(AppointmentStatus::Completed),
            cancelled_appointments: appointments_in(AppointmentStatus::Cancelled),
        })
    }

    /// Appointments joined with their doctor, newest date and time first.
    pub async fn list_appointments(
        &self,
        status: Option<AppointmentStatus>,
    ) -> Result<Vec<AppointmentWithDoctor>, StoreError> {
        let appointments = self.storage.appointments.list_appointments(status).await?;
        let doctors: HashMap<DoctorId, Doctor> = self.storage.doctors
            .list_doctors()
            .await?
            .into_iter()
            .map(|doctor| (doctor.id, doctor))
            .collect();
        debug!("Listing {} appointments", appointments.len());

        Ok(appointments
            .into_iter()
            .map(|appointment| {
                let doctor = doctors.get(&appointment.doctor_id);
                AppointmentWithDoctor {
                    doctor_name: doctor.map(|d| d.name.clone()),
                    doctor_specialization: doctor.map(|d| d.specialization.clone()),
                    appointment,
                }
            })
            .collect())
    }
}
