use axum::{http::StatusCode, Json};
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope shared by every endpoint.
pub fn success<T: Serialize>(data: T, message: &str) -> Json<Value> {
    Json(json!({
        "success": true,
        "message": message,
        "data": data,
    }))
}

pub fn created<T: Serialize>(data: T, message: &str) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, success(data, message))
}
