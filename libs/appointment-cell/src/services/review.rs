use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{debug, info, instrument, warn};

use shared_database::Storage;
use shared_models::scheduling::{Appointment, AppointmentId, AppointmentStatus, ReviewSubmission};
use shared_utils::clock::Clock;

use crate::models::{ReviewClaims, ReviewContext, ReviewError, ReviewReceipt, ReviewSubmitRequest};

type HmacSha256 = Hmac<Sha256>;

/// Review links stop working after this long.
pub fn review_token_lifetime() -> Duration {
    Duration::days(30)
}

/// Issues and checks `<appointmentId>-<issuedAtMillis>-<hexHmacSha256>` tokens.
pub struct ReviewTokenSigner {
    secret: Vec<u8>,
}

impl ReviewTokenSigner {
    pub fn new(secret: &str) -> Self {
        Self { secret: secret.as_bytes().to_vec() }
    }

    fn mac(&self, payload: &str) -> Result<HmacSha256, ReviewError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|_| ReviewError::Signing)?;
        mac.update(payload.as_bytes());
        Ok(mac)
    }

    pub fn issue(&self, appointment_id: AppointmentId, issued_at: DateTime<Utc>) -> Result<String, ReviewError> {
        let payload = format!("{}-{}", appointment_id, issued_at.timestamp_millis());
        let signature = hex::encode(self.mac(&payload)?.finalize().into_bytes());
        Ok(format!("{}-{}", payload, signature))
    }

    /// Shape, signature and age checks only; the caller still has to match
    /// the token against the stored appointment.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<ReviewClaims, ReviewError> {
        let parts: Vec<&str> = token.split('-').collect();
        let [id, millis, signature] = parts.as_slice() else {
            return Err(ReviewError::InvalidToken);
        };

        let appointment_id: AppointmentId = id.parse().map_err(|_| ReviewError::InvalidToken)?;
        let issued_millis: i64 = millis.parse().map_err(|_| ReviewError::InvalidToken)?;
        let signature = hex::decode(signature).map_err(|_| ReviewError::InvalidToken)?;

        if self.mac(&format!("{}-{}", id, millis))?.verify_slice(&signature).is_err() {
            debug!("Review token signature mismatch for appointment {}", appointment_id);
            return Err(ReviewError::InvalidToken);
        }

        let issued_at = Utc
            .timestamp_millis_opt(issued_millis)
            .single()
            .ok_or(ReviewError::InvalidToken)?;

        if now - issued_at > review_token_lifetime() {
            debug!("Review token for appointment {} expired", appointment_id);
            return Err(ReviewError::InvalidToken);
        }

        Ok(ReviewClaims { appointment_id, issued_at })
    }
}

pub struct ReviewService {
    storage: Storage,
    clock: Arc<dyn Clock>,
    signer: Arc<ReviewTokenSigner>,
}

impl ReviewService {
    pub fn new(storage: Storage, clock: Arc<dyn Clock>, signer: Arc<ReviewTokenSigner>) -> Self {
        Self { storage, clock, signer }
    }

    /// The completed appointment a token was issued for.
    async fn reviewable_appointment(&self, token: &str) -> Result<Appointment, ReviewError> {
        let claims = self.signer.verify(token, self.clock.now())?;

        let appointment = self.storage.appointments
            .get_appointment(claims.appointment_id)
            .await?
            .filter(|a| a.status == AppointmentStatus::Completed && a.review_token.as_deref() == Some(token))
            .ok_or(ReviewError::NotFound)?;

        if appointment.reviewed_at.is_some() {
            return Err(ReviewError::AlreadyReviewed);
        }

        Ok(appointment)
    }

    #[instrument(skip(self, token))]
    pub async fn verify(&self, token: Option<&str>) -> Result<ReviewContext, ReviewError> {
        let token = token.filter(|t| !t.is_empty()).ok_or(ReviewError::MissingToken)?;
        let appointment = self.reviewable_appointment(token).await?;

        let doctor = self.storage.doctors.get_doctor(appointment.doctor_id).await?;

        Ok(ReviewContext {
            appointment_id: appointment.id,
            patient_name: appointment.patient_name,
            doctor_id: appointment.doctor_id,
            doctor_name: doctor.as_ref().map(|d| d.name.clone()),
            doctor_specialization: doctor.map(|d| d.specialization),
            appointment_date: appointment.appointment_date,
            appointment_time: appointment.appointment_time,
        })
    }

    /// Stores the rating once; later submissions with the same token fail.
    #[instrument(skip(self, request))]
    pub async fn submit(&self, request: ReviewSubmitRequest) -> Result<ReviewReceipt, ReviewError> {
        let token = request.token
            .filter(|t| !t.is_empty())
            .ok_or(ReviewError::MissingToken)?;

        let rating = request.rating
            .filter(|r| (1..=5).contains(r))
            .and_then(|r| i16::try_from(r).ok())
            .ok_or(ReviewError::InvalidRating)?;

        let appointment = self.reviewable_appointment(&token).await?;

        let review = ReviewSubmission {
            review_rating: rating,
            review_text: request.review_text
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            reviewed_at: self.clock.now(),
        };

        let Some(reviewed) = self.storage.appointments
            .record_review(appointment.id, &token, &review)
            .await?
        else {
            warn!("Concurrent review submission for appointment {}", appointment.id);
            return Err(ReviewError::AlreadyReviewed);
        };

        info!("Recorded {}-star review for appointment {}", rating, reviewed.id);

        Ok(ReviewReceipt {
            appointment_id: reviewed.id,
            rating,
            reviewed_at: review.reviewed_at,
        })
    }
}
