use assert_matches::assert_matches;
use chrono::{NaiveDate, NaiveDateTime};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::{AvailabilityService, PolicyViolation, ScheduleError};
use shared_config::AppConfig;
use shared_utils::test_utils::{MockSupabaseResponses, TestConfig};

const TOKEN: &str = "test-token";

async fn setup() -> (MockServer, AppConfig) {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    (mock_server, config)
}

async fn mount_no_stored_settings(mock_server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(mock_server)
        .await;
}

fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

fn at(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
}

#[tokio::test]
async fn test_list_blocked_days_in_date_order() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_days"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("order", "block_date.asc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::blocked_day_response(&doctor_id, "2025-03-11", Some("Conference")),
            MockSupabaseResponses::blocked_day_response(&doctor_id, "2025-03-14", None),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let days = service.list_blocked_days(&doctor_id, TOKEN).await.unwrap();

    assert_eq!(days.len(), 2);
    assert_eq!(days[0].block_date, date("2025-03-11"));
    assert_eq!(days[0].reason.as_deref(), Some("Conference"));
}

#[tokio::test]
async fn test_block_day_success() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_days"))
        .and(body_partial_json(json!({ "doctor_id": doctor_id, "block_date": "2025-03-11" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::blocked_day_response(&doctor_id, "2025-03-11", Some("Leave")),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let blocked = service
        .block_day(&doctor_id, date("2025-03-11"), Some("Leave".to_string()), TOKEN)
        .await
        .unwrap();

    assert_eq!(blocked.block_date, date("2025-03-11"));
    assert_eq!(blocked.doctor_id, doctor_id);
}

#[tokio::test]
async fn test_block_day_twice_is_duplicate() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_days"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::unique_violation_response("blocked_days_doctor_id_block_date_key"),
        ))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service.block_day(&doctor_id, date("2025-03-11"), None, TOKEN).await;

    assert_matches!(result, Err(ScheduleError::DuplicateBlock(msg)) if msg == "This day is already blocked.");
}

#[tokio::test]
async fn test_unblock_missing_day_is_not_found() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/blocked_days"))
        .and(query_param("block_date", "eq.2025-03-12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service.unblock_day(&doctor_id, date("2025-03-12"), TOKEN).await;

    assert_matches!(result, Err(ScheduleError::NotFound(_)));
}

#[tokio::test]
async fn test_unblock_day_success() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/blocked_days"))
        .and(query_param("doctor_id", format!("eq.{}", doctor_id)))
        .and(query_param("block_date", "eq.2025-03-11"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            MockSupabaseResponses::blocked_day_response(&doctor_id, "2025-03-11", None),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    assert!(service.unblock_day(&doctor_id, date("2025-03-11"), TOKEN).await.is_ok());
}

#[tokio::test]
async fn test_block_slot_truncates_seconds() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();
    mount_no_stored_settings(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_time_slots"))
        .and(body_partial_json(json!({ "slot_datetime": "2025-03-10 15:30:00" })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::blocked_slot_response(&doctor_id, "2025-03-10T15:30:00", None),
        ])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let blocked = service
        .block_slot(&doctor_id, at("2025-03-10 15:30:45"), None, TOKEN)
        .await
        .unwrap();

    assert_eq!(blocked.slot_datetime, at("2025-03-10 15:30:00"));
}

#[tokio::test]
async fn test_block_slot_on_sunday_is_rejected_before_insert() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();
    mount_no_stored_settings(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_time_slots"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service.block_slot(&doctor_id, at("2025-03-09 12:00:00"), None, TOKEN).await;

    assert_matches!(result, Err(ScheduleError::InvalidSlot(PolicyViolation::ClosedDay(_))));
}

#[tokio::test]
async fn test_block_slot_outside_hours_is_rejected() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();
    mount_no_stored_settings(&mock_server).await;

    let service = AvailabilityService::new(&config);
    let result = service.block_slot(&doctor_id, at("2025-03-10 19:00:00"), None, TOKEN).await;

    assert_matches!(result, Err(ScheduleError::InvalidSlot(PolicyViolation::OutsideHours { .. })));
}

#[tokio::test]
async fn test_block_slot_twice_is_duplicate() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();
    mount_no_stored_settings(&mock_server).await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_time_slots"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::unique_violation_response("blocked_time_slots_doctor_id_slot_datetime_key"),
        ))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service.block_slot(&doctor_id, at("2025-03-10 12:00:00"), None, TOKEN).await;

    assert_matches!(result, Err(ScheduleError::DuplicateBlock(_)));
}

#[tokio::test]
async fn test_slot_lookups() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_time_slots"))
        .and(query_param("slot_datetime", "eq.2025-03-10T12:00:00"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "x" }])))
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    assert!(service.is_slot_blocked(&doctor_id, at("2025-03-10 12:00:00"), TOKEN).await.unwrap());
    assert!(!service.is_slot_blocked(&doctor_id, at("2025-03-10 12:30:00"), TOKEN).await.unwrap());
}

#[tokio::test]
async fn test_storage_error_is_storage_failure() {
    let (mock_server, config) = setup().await;
    let doctor_id = config.clinic_doctor_id.clone();

    Mock::given(method("GET"))
        .and(path("/rest/v1/blocked_days"))
        .respond_with(ResponseTemplate::new(500).set_body_json(
            MockSupabaseResponses::error_response("connection reset", "XX000"),
        ))
        .mount(&mock_server)
        .await;

    let service = AvailabilityService::new(&config);
    let result = service.is_day_blocked(&doctor_id, date("2025-03-11"), TOKEN).await;

    assert_matches!(result, Err(ScheduleError::Storage(_)));
}
