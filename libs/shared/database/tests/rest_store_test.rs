use std::sync::Arc;

use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use shared_database::{
    AppointmentStore, DoctorRemoval, DoctorStore, SlotClaim, SlotStore, StoreError, SupabaseStore,
};
use shared_database::supabase::SupabaseClient;
use shared_models::scheduling::{AppointmentStatus, StatusChange};
use shared_utils::test_utils::{date, test_now, time, TestConfig};

fn store(server: &MockServer) -> SupabaseStore {
    let config = TestConfig::with_supabase_url(&server.uri()).to_app_config();
    SupabaseStore::new(Arc::new(SupabaseClient::new(&config)))
}

fn doctor_row() -> serde_json::Value {
    json!({
        "id": 7,
        "name": "Ada Smith",
        "specialization": "Cardiology",
        "email": "ada@clinic.test",
        "phone": "555-0101",
        "experience": 1.5,
        "completed_appointments": 3,
        "total_appointments": 4,
        "created_at": "2030-01-01T00:00:00Z"
    })
}

async fn mount_doctor(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([doctor_row()])))
        .mount(server)
        .await;
}

fn slot_row(booked: bool) -> serde_json::Value {
    json!({ "doctor_id": 7, "available_date": "2030-01-11", "slot_time": "09:00:00", "is_booked": booked })
}

#[tokio::test]
async fn test_mark_booked_patches_only_free_slot() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", "eq.7"))
        .and(query_param("slot_time", "eq.09:00:00"))
        .and(query_param("is_booked", "eq.false"))
        .and(header("apikey", "test-service-key"))
        .and(header("prefer", "return=representation"))
        .and(body_json(json!({ "is_booked": true })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(true)])))
        .expect(1)
        .mount(&server)
        .await;

    let claim = store(&server).mark_booked(7, date("2030-01-11"), time("09:00")).await.unwrap();
    assert_eq!(claim, SlotClaim::Claimed);
}

#[tokio::test]
async fn test_mark_booked_distinguishes_taken_from_missing() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("slot_time", "eq.09:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(true)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("slot_time", "eq.10:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let store = store(&server);
    assert_eq!(store.mark_booked(7, date("2030-01-11"), time("09:00")).await.unwrap(), SlotClaim::AlreadyBooked);
    assert_eq!(store.mark_booked(7, date("2030-01-11"), time("10:00")).await.unwrap(), SlotClaim::NotFound);
}

#[tokio::test]
async fn test_status_update_is_guarded_by_expected_status() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/rest/v1/appointments"))
        .and(query_param("id", "eq.42"))
        .and(query_param("status", "eq.pending"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let change = StatusChange {
        status: AppointmentStatus::Approved,
        review_token: None,
        review_token_sent_at: None,
        updated_at: test_now(),
    };
    let updated = store(&server).update_status(42, AppointmentStatus::Pending, &change).await.unwrap();
    assert!(updated.is_none());
}

#[tokio::test]
async fn test_unique_violation_maps_to_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key value violates unique constraint"))
        .mount(&server)
        .await;

    let details = shared_models::scheduling::DoctorDetails {
        name: "Ada Smith".to_string(),
        specialization: "Cardiology".to_string(),
        email: "ada@clinic.test".to_string(),
        phone: "555-0101".to_string(),
        experience: 2.0,
    };
    assert_matches!(
        store(&server).insert_doctor(&details, test_now()).await,
        Err(StoreError::Conflict(message)) if message.contains("unique")
    );
}

#[tokio::test]
async fn test_doctor_rows_deserialize() {
    let server = MockServer::start().await;
    mount_doctor(&server).await;

    let doctor = store(&server).get_doctor(7).await.unwrap().unwrap();
    assert_eq!(doctor.experience_label(), "1 year 6 months");
    assert_eq!(doctor.completed_appointments, 3);
}

#[tokio::test]
async fn test_storage_outage_surfaces_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream unavailable"))
        .mount(&server)
        .await;

    assert_matches!(
        store(&server).list_appointments(None).await,
        Err(StoreError::Api { status: 503, .. })
    );
}

#[tokio::test]
async fn test_create_slots_ignores_duplicates_and_counts_returned_rows() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("on_conflict", "doctor_id,available_date,slot_time"))
        .and(header("prefer", "resolution=ignore-duplicates,return=representation"))
        .and(body_json(json!([
            { "doctor_id": 7, "available_date": "2030-01-11", "slot_time": "09:00:00", "is_booked": false },
            { "doctor_id": 7, "available_date": "2030-01-11", "slot_time": "10:00:00", "is_booked": false }
        ])))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            { "doctor_id": 7, "available_date": "2030-01-11", "slot_time": "10:00:00", "is_booked": false }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let day = date("2030-01-11");
    let inserted = store(&server)
        .create_slots(7, &[(day, time("09:00")), (day, time("10:00"))])
        .await
        .unwrap();
    assert_eq!(inserted, 1);
}

#[tokio::test]
async fn test_create_slots_with_nothing_to_insert_skips_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(store(&server).create_slots(7, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_delete_unbooked_slots_filters_on_free_rows() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", "eq.7"))
        .and(query_param("is_booked", "eq.false"))
        .and(header("prefer", "return=representation"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(false), slot_row(false)])))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).delete_unbooked_slots(7).await.unwrap(), 2);
}

#[tokio::test]
async fn test_refused_doctor_delete_leaves_slots_untouched() {
    let server = MockServer::start().await;
    mount_doctor(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", "eq.7"))
        .and(query_param("is_booked", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "doctor_id": 7 }])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(store(&server).delete_doctor(7).await.unwrap(), DoctorRemoval::HasBookedSlots);
}

#[tokio::test]
async fn test_doctor_delete_removes_free_slots_then_doctor() {
    let server = MockServer::start().await;
    mount_doctor(&server).await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("is_booked", "eq.true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctor_availability"))
        .and(query_param("doctor_id", "eq.7"))
        .and(query_param("is_booked", "eq.false"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([slot_row(false)])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/rest/v1/doctors"))
        .and(query_param("id", "eq.7"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    assert_eq!(store(&server).delete_doctor(7).await.unwrap(), DoctorRemoval::Deleted);
}

#[tokio::test]
async fn test_deleting_unknown_doctor_issues_no_writes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctors"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    assert_eq!(store(&server).delete_doctor(8).await.unwrap(), DoctorRemoval::NotFound);
}
