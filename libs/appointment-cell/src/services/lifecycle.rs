use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};

use notification_cell::{Notification, NotificationKind, Notifier};
use shared_config::AppConfig;
use shared_database::{SlotRelease, Storage, StoreResult};
use shared_models::scheduling::{Appointment, AppointmentId, AppointmentStatus, StatusChange};
use shared_utils::clock::Clock;

use crate::models::{LifecycleError, TransitionOutcome};
use crate::services::notify::notification_context;
use crate::services::review::ReviewTokenSigner;

pub const DEFAULT_REJECTION_REASON: &str = "The requested time slot is no longer available";

/// Statuses reachable from `from`. `pending` is only ever an initial status.
pub fn allowed_transitions(from: AppointmentStatus) -> &'static [AppointmentStatus] {
    match from {
        AppointmentStatus::Pending => &[AppointmentStatus::Approved, AppointmentStatus::Rejected],
        AppointmentStatus::Approved => &[AppointmentStatus::Completed, AppointmentStatus::Cancelled],
        AppointmentStatus::Rejected | AppointmentStatus::Completed | AppointmentStatus::Cancelled => &[],
    }
}

pub fn validate_status_transition(
    from: AppointmentStatus,
    to: AppointmentStatus,
) -> Result<(), LifecycleError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        warn!("Invalid status transition attempted: {} -> {}", from, to);
        Err(LifecycleError::InvalidTransition { from, to })
    }
}

pub fn status_message(status: AppointmentStatus) -> &'static str {
    match status {
        AppointmentStatus::Approved => "Appointment approved and confirmation email sent",
        AppointmentStatus::Rejected => "Appointment rejected and notification email sent",
        AppointmentStatus::Completed => "Appointment marked as completed and review request sent",
        AppointmentStatus::Cancelled => "Appointment cancelled and slot freed up",
        AppointmentStatus::Pending => "Appointment status updated to pending",
    }
}

pub struct LifecycleService {
    config: Arc<AppConfig>,
    storage: Storage,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    signer: Arc<ReviewTokenSigner>,
}

impl LifecycleService {
    pub fn new(
        config: Arc<AppConfig>,
        storage: Storage,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
        signer: Arc<ReviewTokenSigner>,
    ) -> Self {
        Self { config, storage, clock, notifier, signer }
    }

    /// Moves an appointment to `new_status` and runs the side effects of that
    /// edge. Storage side effects are all-or-nothing with the status write;
    /// notification failures only produce warnings.
    #[instrument(skip(self, rejection_reason))]
    pub async fn transition(
        &self,
        appointment_id: AppointmentId,
        new_status: &str,
        rejection_reason: Option<String>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let to: AppointmentStatus = new_status
            .parse()
            .map_err(|_| LifecycleError::InvalidStatus(new_status.to_string()))?;

        let current = self.storage.appointments
            .get_appointment(appointment_id)
            .await?
            .ok_or(LifecycleError::NotFound)?;

        validate_status_transition(current.status, to)?;

        let now = self.clock.now();
        let (review_token, review_token_sent_at) = if to == AppointmentStatus::Completed {
            (Some(self.signer.issue(appointment_id, now)?), Some(now))
        } else {
            (current.review_token.clone(), current.review_token_sent_at)
        };

        let change = StatusChange {
            status: to,
            review_token,
            review_token_sent_at,
            updated_at: now,
        };

        let Some(updated) = self.storage.appointments
            .update_status(appointment_id, current.status, &change)
            .await?
        else {
            return Err(self.lost_race(appointment_id, to).await);
        };

        if let Err(e) = self.apply_storage_effects(&updated).await {
            error!("Side effect of {} -> {} failed for appointment {}: {}", current.status, to, appointment_id, e);
            self.revert(&current, to).await;
            return Err(LifecycleError::Storage(e));
        }

        info!("Appointment {} moved {} -> {}", appointment_id, current.status, to);

        let warnings = self.send_notification(&updated, rejection_reason).await;

        Ok(TransitionOutcome {
            appointment: updated,
            message: status_message(to),
            warnings,
        })
    }

    /// The conditional write matched nothing: the row vanished or another
    /// request moved it first.
    async fn lost_race(&self, appointment_id: AppointmentId, to: AppointmentStatus) -> LifecycleError {
        match self.storage.appointments.get_appointment(appointment_id).await {
            Ok(Some(latest)) => {
                debug!("Appointment {} changed concurrently to {}", appointment_id, latest.status);
                LifecycleError::InvalidTransition { from: latest.status, to }
            }
            Ok(None) => LifecycleError::NotFound,
            Err(e) => LifecycleError::Storage(e),
        }
    }

    async fn apply_storage_effects(&self, appointment: &Appointment) -> StoreResult<()> {
        match appointment.status {
            AppointmentStatus::Rejected | AppointmentStatus::Cancelled => {
                let released = self.storage.slots
                    .mark_free(appointment.doctor_id, appointment.appointment_date, appointment.appointment_time)
                    .await?;
                if released == SlotRelease::NotFound {
                    warn!("Slot of appointment {} no longer exists", appointment.id);
                }
                Ok(())
            }
            AppointmentStatus::Completed => {
                self.storage.doctors.record_completed_appointment(appointment.doctor_id).await
            }
            AppointmentStatus::Approved | AppointmentStatus::Pending => Ok(()),
        }
    }

    /// Puts the status columns back after a failed side effect.
    async fn revert(&self, original: &Appointment, applied: AppointmentStatus) {
        let restore = StatusChange {
            status: original.status,
            review_token: original.review_token.clone(),
            review_token_sent_at: original.review_token_sent_at,
            updated_at: original.updated_at,
        };

        match self.storage.appointments.update_status(original.id, applied, &restore).await {
            Ok(Some(_)) => info!("Reverted appointment {} to {}", original.id, original.status),
            Ok(None) => warn!("Appointment {} changed again before it could be reverted", original.id),
            Err(e) => error!("Failed to revert appointment {} to {}: {}", original.id, original.status, e),
        }
    }

    async fn send_notification(&self, appointment: &Appointment, rejection_reason: Option<String>) -> Vec<String> {
        let kind = match appointment.status {
            AppointmentStatus::Approved => NotificationKind::Approved,
            AppointmentStatus::Rejected => NotificationKind::Rejected,
            AppointmentStatus::Completed => NotificationKind::ReviewRequest,
            AppointmentStatus::Cancelled | AppointmentStatus::Pending => return Vec::new(),
        };

        let doctor = match self.storage.doctors.get_doctor(appointment.doctor_id).await {
            Ok(doctor) => doctor,
            Err(e) => {
                warn!("Could not load doctor {} for the email: {}", appointment.doctor_id, e);
                None
            }
        };

        let mut context = notification_context(appointment, doctor.as_ref());
        if kind == NotificationKind::Rejected {
            context.rejection_reason = Some(
                rejection_reason
                    .map(|reason| reason.trim().to_string())
                    .filter(|reason| !reason.is_empty())
                    .unwrap_or_else(|| DEFAULT_REJECTION_REASON.to_string()),
            );
        }
        if let Some(token) = &appointment.review_token {
            if kind == NotificationKind::ReviewRequest {
                context.review_link = Some(self.config.review_link(token));
            }
        }

        match self.notifier.notify(Notification::new(kind, &appointment.patient_email, context)) {
            Ok(()) => Vec::new(),
            Err(e) => {
                warn!("Appointment {} is {} but the email was not queued: {}", appointment.id, appointment.status, e);
                vec![format!("{} email not sent: {}", kind_label(kind), e)]
            }
        }
    }
}

fn kind_label(kind: NotificationKind) -> &'static str {
    match kind {
        NotificationKind::Received => "Request received",
        NotificationKind::Approved => "Approval",
        NotificationKind::Rejected => "Rejection",
        NotificationKind::ReviewRequest => "Review request",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_transition_table() {
        use AppointmentStatus::*;

        for (from, to) in [(Pending, Approved), (Pending, Rejected), (Approved, Completed), (Approved, Cancelled)] {
            assert!(validate_status_transition(from, to).is_ok(), "{} -> {}", from, to);
        }

        for from in AppointmentStatus::ALL {
            assert_matches!(
                validate_status_transition(from, Pending),
                Err(LifecycleError::InvalidTransition { .. })
            );
        }

        for from in [Rejected, Completed, Cancelled] {
            assert!(allowed_transitions(from).is_empty());
        }

        assert_matches!(
            validate_status_transition(Pending, Completed),
            Err(LifecycleError::InvalidTransition { from: Pending, to: Completed })
        );
    }
}
