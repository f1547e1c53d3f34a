use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use doctor_cell::{doctor_routes, DoctorCellState};
use shared_database::Storage;
use shared_utils::test_utils::{fixed_clock, JwtTestUtils, TestConfig, TestUser};

fn router(config: &TestConfig) -> Router {
    let state = DoctorCellState::new(config.to_arc(), Storage::in_memory(), fixed_clock());
    doctor_routes(Arc::new(state))
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn create_request(bearer: Option<String>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header("Authorization", bearer);
    }
    builder
        .body(Body::from(
            json!({
                "name": "Ada Smith",
                "specialization": "Cardiology",
                "email": "ada@clinic.test",
                "phone": "555-0101",
                "experience": 2,
                "slots": [{ "date": "2030-01-11", "time": ["09:00", "10:00"] }]
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_admin_creates_then_public_lists() {
    let config = TestConfig::default();
    let app = router(&config);

    let response = app
        .clone()
        .oneshot(create_request(Some(JwtTestUtils::admin_bearer(&config))))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["slots_created"], 2);

    let response = app
        .oneshot(Request::builder().uri("/?status=available").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["data"][0]["name"], "Ada Smith");
    assert_eq!(body["data"][0]["status"], "available");
    assert_eq!(body["data"][0]["slots"][0], json!({ "date": "2030-01-11", "time": "09:00:00", "booked": false }));
}

#[tokio::test]
async fn test_create_requires_admin() {
    let config = TestConfig::default();

    let anonymous = router(&config).oneshot(create_request(None)).await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let token = JwtTestUtils::create_test_token(&TestUser::default(), &config.jwt_secret, None);
    let staff = router(&config)
        .oneshot(create_request(Some(format!("Bearer {}", token))))
        .await
        .unwrap();
    assert_eq!(staff.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_unknown_status_filter_is_validation_error() {
    let response = router(&TestConfig::default())
        .oneshot(Request::builder().uri("/?status=sleeping").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["code"], "validation_error");
}

#[tokio::test]
async fn test_delete_unknown_doctor_is_not_found() {
    let config = TestConfig::default();
    let response = router(&config)
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/77")
                .header("Authorization", JwtTestUtils::admin_bearer(&config))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_mistyped_experience_gets_error_envelope() {
    let config = TestConfig::default();
    let request = Request::builder()
        .method("POST")
        .uri("/")
        .header("Content-Type", "application/json")
        .header("Authorization", JwtTestUtils::admin_bearer(&config))
        .body(Body::from(
            json!({
                "name": "Ada Smith",
                "specialization": "Cardiology",
                "email": "ada@clinic.test",
                "phone": "555-0101",
                "experience": "five years"
            })
            .to_string(),
        ))
        .unwrap();

    let response = router(&config).oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "validation_error");
}
