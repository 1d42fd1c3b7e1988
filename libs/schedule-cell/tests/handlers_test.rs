use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use assert_matches::assert_matches;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use schedule_cell::handlers::*;
use schedule_cell::models::{BlockDayRequest, BlockSlotRequest};
use shared_models::{auth::User, error::AppError};
use shared_utils::test_utils::{JwtTestUtils, MockSupabaseResponses, TestConfig, TestUser};

fn create_auth_header(token: &str) -> TypedHeader<Authorization<Bearer>> {
    let auth = Authorization::bearer(token).unwrap();
    TypedHeader(auth)
}

fn as_extension(user: &TestUser) -> Extension<User> {
    Extension(user.to_user())
}

#[tokio::test]
async fn test_patient_cannot_block_day() {
    let config = TestConfig::default().to_app_config();
    let patient = TestUser::patient("patient@example.com");
    let token = JwtTestUtils::create_test_token(&patient, &config.supabase_jwt_secret, Some(1));

    let result = block_day(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&patient),
        Json(BlockDayRequest { block_date: Some("2025-03-11".to_string()), reason: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_other_doctor_cannot_manage_clinic_calendar() {
    let config = TestConfig::default().to_app_config();
    let stranger = TestUser::doctor("other@example.com");
    let token = JwtTestUtils::create_test_token(&stranger, &config.supabase_jwt_secret, Some(1));

    let result = get_blocked_days(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&stranger),
    )
    .await;

    assert_matches!(result, Err(AppError::Forbidden(_)));
}

#[tokio::test]
async fn test_block_day_requires_strict_date() {
    let config = TestConfig::default().to_app_config();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    let result = block_day(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
        Json(BlockDayRequest { block_date: Some("11/03/2025".to_string()), reason: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(_)));
}

#[tokio::test]
async fn test_block_day_created() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_days"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([
            MockSupabaseResponses::blocked_day_response(&doctor.id, "2025-03-11", Some("Holiday")),
        ])))
        .mount(&mock_server)
        .await;

    let (status, Json(body)) = block_day(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
        Json(BlockDayRequest { block_date: Some("2025-03-11".to_string()), reason: Some("Holiday".to_string()) }),
    )
    .await
    .unwrap();

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["block_date"], "2025-03-11");
    assert_eq!(body["message"], "Day blocked successfully.");
}

#[tokio::test]
async fn test_duplicate_block_is_conflict() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("POST"))
        .and(path("/rest/v1/blocked_days"))
        .respond_with(ResponseTemplate::new(409).set_body_json(
            MockSupabaseResponses::unique_violation_response("blocked_days_doctor_id_block_date_key"),
        ))
        .mount(&mock_server)
        .await;

    let result = block_day(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
        Json(BlockDayRequest { block_date: Some("2025-03-11".to_string()), reason: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::Conflict(msg)) if msg == "This day is already blocked.");
}

#[tokio::test]
async fn test_block_slot_on_sunday_is_bad_request() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = block_slot(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
        Json(BlockSlotRequest { slot_datetime: Some("2025-03-09 12:00".to_string()), reason: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("closed on Sundays"));
}

#[tokio::test]
async fn test_unblock_slot_missing_is_not_found() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("DELETE"))
        .and(path("/rest/v1/blocked_time_slots"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let result = unblock_slot(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
        Json(BlockSlotRequest { slot_datetime: Some("2025-03-10 12:00:00".to_string()), reason: None }),
    )
    .await;

    assert_matches!(result, Err(AppError::NotFound(_)));
}

#[tokio::test]
async fn test_get_settings_defaults() {
    let mock_server = MockServer::start().await;
    let mut config = TestConfig::default().to_app_config();
    config.supabase_url = mock_server.uri();
    let doctor = TestUser::clinic_doctor(&config);
    let token = JwtTestUtils::create_test_token(&doctor, &config.supabase_jwt_secret, Some(1));

    Mock::given(method("GET"))
        .and(path("/rest/v1/doctor_schedule_settings"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let Json(body) = get_schedule_settings(
        State(Arc::new(config)),
        create_auth_header(&token),
        as_extension(&doctor),
    )
    .await
    .unwrap();

    assert_eq!(body["start_time"], "11:00:00");
    assert_eq!(body["working_days"], json!(["Mon", "Tue", "Wed", "Thu", "Fri"]));
}
