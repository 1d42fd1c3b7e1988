use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};

use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::datetime::{format_wire_datetime, parse_wire_date, parse_wire_datetime};
use shared_models::error::AppError;
use shared_utils::extractor::require_doctor;

use crate::models::{BlockDayRequest, BlockSlotRequest, UpdateScheduleSettingsRequest};
use crate::services::{AvailabilityService, ScheduleSettingsService};

/// Resolves the doctor whose calendar the actor may manage.
///
/// Only the configured clinic doctor may manage availability. When no clinic
/// doctor is configured any doctor manages their own rows.
pub fn doctor_scope(user: &User, config: &AppConfig) -> Result<String, AppError> {
    require_doctor(user)?;

    if !config.clinic_doctor_id.is_empty() && config.clinic_doctor_id != user.id {
        return Err(AppError::Forbidden("Access denied. Doctors only.".to_string()));
    }

    Ok(user.id.clone())
}

fn required_date(raw: Option<&str>) -> Result<chrono::NaiveDate, AppError> {
    raw.and_then(parse_wire_date)
        .ok_or_else(|| AppError::BadRequest("Valid block_date (YYYY-MM-DD) is required.".to_string()))
}

fn required_slot(raw: Option<&str>, config: &AppConfig) -> Result<chrono::NaiveDateTime, AppError> {
    let raw = raw.ok_or_else(|| AppError::BadRequest("slot_datetime is required.".to_string()))?;
    parse_wire_datetime(raw, &config.clinic_utc_offset)
        .ok_or_else(|| AppError::BadRequest("Invalid date/time format for slot_datetime.".to_string()))
}

// ==============================================================================
// BLOCKED DAYS
// ==============================================================================

pub async fn get_blocked_days(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;

    let service = AvailabilityService::new(&state);
    let days = service.list_blocked_days(&doctor_id, auth.token()).await?;

    Ok(Json(json!(days)))
}

pub async fn block_day(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockDayRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = doctor_scope(&user, &state)?;
    let date = required_date(request.block_date.as_deref())?;

    let service = AvailabilityService::new(&state);
    let blocked = service.block_day(&doctor_id, date, request.reason, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "message": "Day blocked successfully.",
        "id": blocked.id,
        "block_date": blocked.block_date,
        "reason": blocked.reason,
    }))))
}

pub async fn unblock_day(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockDayRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;
    let date = required_date(request.block_date.as_deref())?;

    let service = AvailabilityService::new(&state);
    service.unblock_day(&doctor_id, date, auth.token()).await?;

    Ok(Json(json!({ "message": "Day unblocked successfully." })))
}

// ==============================================================================
// BLOCKED SLOTS
// ==============================================================================

pub async fn get_blocked_slots(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;

    let service = AvailabilityService::new(&state);
    let slots = service.list_blocked_slots(&doctor_id, auth.token()).await?;

    Ok(Json(json!(slots)))
}

pub async fn block_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockSlotRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let doctor_id = doctor_scope(&user, &state)?;
    let slot = required_slot(request.slot_datetime.as_deref(), &state)?;

    let service = AvailabilityService::new(&state);
    let blocked = service.block_slot(&doctor_id, slot, request.reason, auth.token()).await?;

    Ok((StatusCode::CREATED, Json(json!({
        "message": "Time slot blocked successfully.",
        "id": blocked.id,
        "slot_datetime": format_wire_datetime(&blocked.slot_datetime),
        "reason": blocked.reason,
    }))))
}

pub async fn unblock_slot(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BlockSlotRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;
    let slot = required_slot(request.slot_datetime.as_deref(), &state)?;

    let service = AvailabilityService::new(&state);
    service.unblock_slot(&doctor_id, slot, auth.token()).await?;

    Ok(Json(json!({ "message": "Time slot unblocked successfully." })))
}

// ==============================================================================
// SCHEDULE SETTINGS
// ==============================================================================

pub async fn get_schedule_settings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;

    let service = ScheduleSettingsService::new(&state);
    let settings = service.get_settings(&doctor_id, auth.token()).await?;

    Ok(Json(json!(settings)))
}

pub async fn update_schedule_settings(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<UpdateScheduleSettingsRequest>,
) -> Result<Json<Value>, AppError> {
    let doctor_id = doctor_scope(&user, &state)?;

    let service = ScheduleSettingsService::new(&state);
    let settings = service.update_settings(&doctor_id, request, auth.token()).await?;

    Ok(Json(json!({
        "message": "Schedule settings updated successfully!",
        "settings": settings,
    })))
}
