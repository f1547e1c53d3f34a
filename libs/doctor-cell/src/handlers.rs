use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::Value;

use shared_models::error::AppError;
use shared_models::response::{created, success};
use shared_models::scheduling::DoctorId;

use crate::models::{CreateDoctorRequest, StatusFilter, UpdateDoctorRequest};
use crate::DoctorCellState;

#[derive(Debug, Deserialize)]
pub struct DoctorListQuery {
    pub status: Option<String>,
}

fn parse_doctor_id(raw: &str) -> Result<DoctorId, AppError> {
    raw.parse()
        .map_err(|_| AppError::ValidationError(format!("Invalid doctor id: {}", raw)))
}

// ==============================================================================
// PUBLIC HANDLERS
// ==============================================================================

pub async fn list_doctors(
    State(state): State<Arc<DoctorCellState>>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let filter: StatusFilter = query.status.as_deref().unwrap_or("all").parse()?;

    let doctors = state.availability.list_doctors(filter).await?;

    Ok(success(doctors, "Doctor list fetched successfully"))
}

// ==============================================================================
// ADMIN HANDLERS
// ==============================================================================

pub async fn create_doctor(
    State(state): State<Arc<DoctorCellState>>,
    payload: Result<Json<CreateDoctorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let Json(request) = payload?;
    let saved = state.doctors.create_doctor(request).await?;
    Ok(created(saved, "Doctor added successfully"))
}

pub async fn update_doctor(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
    payload: Result<Json<UpdateDoctorRequest>, JsonRejection>,
) -> Result<Json<Value>, AppError> {
    let Json(request) = payload?;
    let doctor_id = parse_doctor_id(&doctor_id)?;
    let saved = state.doctors.update_doctor(doctor_id, request).await?;
    Ok(success(saved, "Doctor updated successfully"))
}

pub async fn delete_doctor(
    State(state): State<Arc<DoctorCellState>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = parse_doctor_id(&doctor_id)?;
    let deleted = state.doctors.delete_doctor(doctor_id).await?;
    Ok(success(deleted, "Doctor deleted successfully"))
}
