use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::future::try_join_all;
use tracing::debug;

use shared_database::Storage;
use shared_models::scheduling::{Doctor, Slot};
use shared_utils::clock::Clock;

use crate::models::{
    DoctorError, DoctorStatus, DoctorWithStatus, ResolvedAvailability, SlotView, StatusFilter,
};

/// Every booked slot is treated as a one-hour session.
pub fn session_length() -> Duration {
    Duration::hours(1)
}

/// Derives a doctor's status and visible slots from raw slot rows.
///
/// Slots that started more than one session ago are hidden. A doctor with no
/// visible slot, or only booked ones, is unavailable; one sitting inside a
/// booked session today is busy; anyone else is available.
pub fn resolve_availability(slots: &[Slot], now: DateTime<Utc>) -> ResolvedAvailability {
    let cutoff = now - session_length();

    let mut visible: Vec<SlotView> = slots
        .iter()
        .filter(|slot| slot.starts_at() >= cutoff)
        .map(|slot| SlotView { date: slot.date, time: slot.time, booked: slot.booked })
        .collect();
    visible.sort_by_key(|slot| (slot.date, slot.time));

    let status = if visible.iter().all(|slot| slot.booked) {
        DoctorStatus::Unavailable
    } else if visible.iter().any(|slot| in_session(slot, now)) {
        DoctorStatus::Busy
    } else {
        DoctorStatus::Available
    };

    ResolvedAvailability { status, slots: visible }
}

fn in_session(slot: &SlotView, now: DateTime<Utc>) -> bool {
    if !slot.booked || slot.date != now.date_naive() {
        return false;
    }
    let start = slot.date.and_time(slot.time).and_utc();
    start <= now && now < start + session_length()
}

pub struct AvailabilityService {
    storage: Storage,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>) -> Self {
        Self { storage, clock }
    }

    pub async fn resolve_doctor(&self, doctor: Doctor) -> Result<DoctorWithStatus, DoctorError> {
        let slots = self.storage.slots.list_slots(doctor.id).await?;
        let resolved = resolve_availability(&slots, self.clock.now());

        Ok(DoctorWithStatus {
            experience_label: doctor.experience_label(),
            status: resolved.status,
            slots: resolved.slots,
            doctor,
        })
    }

    /// Newest doctors first, each with live status and upcoming slots.
    pub async fn list_doctors(&self, filter: StatusFilter) -> Result<Vec<DoctorWithStatus>, DoctorError> {
        let doctors = self.storage.doctors.list_doctors().await?;
        debug!("Resolving availability for {} doctors", doctors.len());

        let resolved = try_join_all(doctors.into_iter().map(|doctor| self.resolve_doctor(doctor))).await?;

        Ok(resolved
            .into_iter()
            .filter(|doctor| filter.matches(doctor.status))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_utils::test_utils::{date, test_now, time};

    // test_now() is 2030-01-10 08:00 UTC.
    fn slot(day: &str, at: &str, booked: bool) -> Slot {
        Slot { doctor_id: 1, date: date(day), time: time(at), booked }
    }

    #[test]
    fn test_no_slots_is_unavailable() {
        let resolved = resolve_availability(&[], test_now());
        assert_eq!(resolved.status, DoctorStatus::Unavailable);
        assert!(resolved.slots.is_empty());
    }

    #[test]
    fn test_slots_older_than_one_hour_are_hidden() {
        let slots = [
            slot("2030-01-10", "06:59", false),
            slot("2030-01-10", "07:00", false),
            slot("2030-01-09", "16:00", false),
        ];

        let resolved = resolve_availability(&slots, test_now());

        assert_eq!(resolved.slots.len(), 1);
        assert_eq!(resolved.slots[0].time, time("07:00"));
    }

    #[test]
    fn test_all_booked_is_unavailable() {
        let slots = [slot("2030-01-11", "09:00", true), slot("2030-01-12", "09:00", true)];
        assert_eq!(resolve_availability(&slots, test_now()).status, DoctorStatus::Unavailable);
    }

    #[test]
    fn test_inside_booked_session_is_busy() {
        let slots = [slot("2030-01-10", "07:30", true), slot("2030-01-10", "10:00", false)];
        assert_eq!(resolve_availability(&slots, test_now()).status, DoctorStatus::Busy);

        // The session window is half-open.
        let ended = [slot("2030-01-10", "07:00", true), slot("2030-01-10", "10:00", false)];
        assert_eq!(resolve_availability(&ended, test_now()).status, DoctorStatus::Available);
    }

    #[test]
    fn test_free_future_slot_is_available_and_sorted() {
        let slots = [
            slot("2030-01-12", "09:00", false),
            slot("2030-01-11", "15:00", true),
            slot("2030-01-11", "09:00", false),
        ];

        let resolved = resolve_availability(&slots, test_now());

        assert_eq!(resolved.status, DoctorStatus::Available);
        let order: Vec<_> = resolved.slots.iter().map(|s| (s.date, s.time)).collect();
        assert_eq!(
            order,
            vec![
                (date("2030-01-11"), time("09:00")),
                (date("2030-01-11"), time("15:00")),
                (date("2030-01-12"), time("09:00")),
            ]
        );
    }
}
