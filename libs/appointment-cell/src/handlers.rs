use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use shared_models::error::AppError;
use shared_models::response::success;
use shared_models::scheduling::AppointmentStatus;

use crate::models::{BookAppointmentRequest, ReviewSubmitRequest, StatusUpdateRequest, StatusUpdateResponse};
use crate::AppointmentCellState;

#[derive(Debug, Deserialize)]
pub struct AppointmentListQuery {
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ReviewTokenQuery {
    pub token: Option<String>,
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    payload: Result<Json<BookAppointmentRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let confirmation = state.booking.book(request).await?;
    Ok(success(confirmation, "Appointment request submitted successfully"))
}

pub async fn verify_review_token(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<ReviewTokenQuery>,
) -> Result<Json<Value>, AppError> {
    let context = state.reviews.verify(query.token.as_deref()).await?;
    Ok(success(context, "Review link is valid"))
}

pub async fn submit_review(
    State(state): State<Arc<AppointmentCellState>>,
    payload: Result<Json<ReviewSubmitRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let receipt = state.reviews.submit(request).await?;
    Ok(success(receipt, "Review submitted successfully"))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

pub async fn list_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Query(query): Query<AppointmentListQuery>,
) -> Result<Json<Value>, AppError> {
    let status = query.status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<AppointmentStatus>())
        .transpose()
        .map_err(|e| AppError::ValidationError(e.to_string()))?;

    let appointments = state.admin.list_appointments(status).await
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(success(appointments, "Appointments fetched successfully"))
}

pub async fn update_appointment_status(
    State(state): State<Arc<AppointmentCellState>>,
    payload: Result<Json<StatusUpdateRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let (Some(appointment_id), Some(status)) = (request.appointment_id, request.status.as_deref()) else {
        return Err(AppError::ValidationError("Appointment ID and status are required".to_string()));
    };

    let outcome = state.lifecycle
        .transition(appointment_id, status, request.rejection_reason)
        .await?;

    let message = outcome.message;
    Ok(success(StatusUpdateResponse::from(outcome), message))
}

pub async fn dashboard_stats(
    State(state): State<Arc<AppointmentCellState>>,
) -> Result<Json<Value>, AppError> {
    let stats = state.admin.dashboard_stats().await?;
    Ok(success(stats, "Stats fetched successfully"))
}
