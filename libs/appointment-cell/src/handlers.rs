use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use reminder_cell::ReminderScheduler;
use shared_config::AppConfig;
use shared_models::auth::User;
use shared_models::datetime::{format_wire_datetime, parse_wire_date};
use shared_models::error::AppError;
use shared_utils::extractor::require_patient;

use crate::models::{AvailableSlotsQuery, BookAppointmentRequest, CompleteAppointmentRequest};
use crate::services::{AppointmentBookingService, AppointmentLifecycleService};

/// Router state: configuration plus the reminder scheduler shared with the worker.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<AppConfig>,
    pub reminders: Arc<ReminderScheduler>,
}

impl AppointmentState {
    pub fn new(config: Arc<AppConfig>, reminders: Arc<ReminderScheduler>) -> Self {
        Self { config, reminders }
    }

    fn booking(&self) -> AppointmentBookingService {
        AppointmentBookingService::new(&self.config, self.reminders.clone())
    }

    fn lifecycle(&self) -> AppointmentLifecycleService {
        AppointmentLifecycleService::new(&self.config, self.reminders.clone())
    }
}

fn require_doctor_action(user: &User) -> Result<(), AppError> {
    if user.is_doctor() {
        Ok(())
    } else {
        Err(AppError::Forbidden("Access denied!".to_string()))
    }
}

// ==============================================================================
// BOOKING
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_patient(&user)?;

    let appointment = state
        .booking()
        .book_appointment(&user, request.appointment_date.as_deref(), auth.token())
        .await?;

    Ok((StatusCode::CREATED, Json(json!({
        "message": "Appointment booked successfully!",
        "appointment": appointment,
    }))))
}

pub async fn get_appointments(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointments = state.booking().list_appointments(&user, auth.token()).await?;
    Ok(Json(json!(appointments)))
}

pub async fn get_available_slots(
    State(state): State<Arc<AppointmentState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(_user): Extension<User>,
    Query(query): Query<AvailableSlotsQuery>,
) -> Result<Json<Value>, AppError> {
    let date = query
        .date
        .as_deref()
        .and_then(parse_wire_date)
        .ok_or_else(|| AppError::BadRequest("Valid date (YYYY-MM-DD) is required.".to_string()))?;

    let slots = state.booking().available_slots(date, auth.token()).await?;

    Ok(Json(json!({
        "date": date,
        "slots": slots.iter().map(format_wire_datetime).collect::<Vec<_>>(),
    })))
}

// ==============================================================================
// LIFECYCLE
// ==============================================================================

pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    state
        .lifecycle()
        .cancel_appointment(appointment_id, &user, auth.token())
        .await?;

    Ok(Json(json!({ "message": "Appointment canceled successfully!" })))
}

pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    require_doctor_action(&user)?;

    let appointment = state
        .lifecycle()
        .confirm_appointment(appointment_id, auth.token())
        .await?;

    Ok(Json(json!({
        "message": "Appointment confirmed!",
        "appointment": appointment,
    })))
}

pub async fn complete_appointment(
    State(state): State<Arc<AppointmentState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    require_doctor_action(&user)?;

    let (appointment, prescription) = state
        .lifecycle()
        .complete_with_prescription(appointment_id, &user, request, auth.token())
        .await?;

    Ok(Json(json!({
        "message": "Prescription saved and appointment completed!",
        "appointment": appointment,
        "prescription": prescription,
    })))
}
