use std::str::FromStr;

use chrono::{NaiveTime, Weekday};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use shared_config::AppConfig;
use shared_database::supabase::SupabaseClient;

use crate::error::ScheduleError;
use crate::models::{normalize_weekdays, ScheduleSettings, UpdateScheduleSettingsRequest};
use crate::policy::SlotPolicy;

pub struct ScheduleSettingsService {
    supabase: SupabaseClient,
    closed_days: Vec<Weekday>,
}

impl ScheduleSettingsService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            closed_days: config.clinic_closed_days.clone(),
        }
    }

    /// The stored row only; `None` when the doctor never saved settings.
    pub async fn find_settings(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Option<ScheduleSettings>, ScheduleError> {
        debug!("Fetching schedule settings for doctor: {}", doctor_id);

        let path = format!("/rest/v1/doctor_schedule_settings?doctor_id=eq.{}&limit=1", doctor_id);
        let rows: Vec<ScheduleSettings> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(rows.into_iter().next())
    }

    pub async fn get_settings(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<ScheduleSettings, ScheduleError> {
        match self.find_settings(doctor_id, auth_token).await? {
            Some(settings) => Ok(settings),
            None => {
                debug!("No schedule settings stored for doctor {}, returning defaults", doctor_id);
                Ok(ScheduleSettings::defaults_for(doctor_id))
            }
        }
    }

    pub async fn policy_for(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<SlotPolicy, ScheduleError> {
        let stored = self.find_settings(doctor_id, auth_token).await?;
        Ok(SlotPolicy::new(doctor_id, &self.closed_days, stored))
    }

    pub async fn update_settings(
        &self,
        doctor_id: &str,
        request: UpdateScheduleSettingsRequest,
        auth_token: &str,
    ) -> Result<ScheduleSettings, ScheduleError> {
        let settings = validate_settings_request(doctor_id, request)?;

        let body = json!({
            "doctor_id": settings.doctor_id,
            "start_time": settings.start_time.format("%H:%M:%S").to_string(),
            "end_time": settings.end_time.format("%H:%M:%S").to_string(),
            "working_days": settings.working_days.iter().map(|d| d.to_string()).collect::<Vec<_>>(),
            "appointment_duration": settings.appointment_duration,
            "break_start_time": settings.break_start_time.format("%H:%M:%S").to_string(),
            "break_end_time": settings.break_end_time.format("%H:%M:%S").to_string(),
        });

        let rows: Vec<ScheduleSettings> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/doctor_schedule_settings?on_conflict=doctor_id",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::upsert_headers()),
        ).await?;

        info!("Schedule settings saved for doctor {}", doctor_id);
        Ok(rows.into_iter().next().unwrap_or(settings))
    }
}

fn parse_clock_time(raw: &str) -> Option<NaiveTime> {
    let raw = raw.trim();
    NaiveTime::parse_from_str(raw, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
        .ok()
}

fn required_time(field: &str, raw: Option<&str>) -> Result<NaiveTime, ScheduleError> {
    let raw = raw.ok_or_else(missing_fields)?;
    parse_clock_time(raw)
        .ok_or_else(|| ScheduleError::InvalidInput(format!("Invalid time for {} (expected HH:MM).", field)))
}

fn missing_fields() -> ScheduleError {
    ScheduleError::InvalidInput("Missing required schedule settings fields.".to_string())
}

/// Checks an update payload and turns it into the row to store.
pub fn validate_settings_request(
    doctor_id: &str,
    request: UpdateScheduleSettingsRequest,
) -> Result<ScheduleSettings, ScheduleError> {
    if request.start_time.is_none()
        || request.end_time.is_none()
        || request.working_days.is_none()
        || request.appointment_duration.is_none()
        || request.break_start_time.is_none()
        || request.break_end_time.is_none()
    {
        return Err(missing_fields());
    }

    let start_time = required_time("startTime", request.start_time.as_deref())?;
    let end_time = required_time("endTime", request.end_time.as_deref())?;
    let break_start_time = required_time("breakStartTime", request.break_start_time.as_deref())?;
    let break_end_time = required_time("breakEndTime", request.break_end_time.as_deref())?;

    if start_time >= end_time {
        return Err(ScheduleError::InvalidInput("startTime must be before endTime.".to_string()));
    }
    if break_start_time > break_end_time {
        return Err(ScheduleError::InvalidInput("breakStartTime must not be after breakEndTime.".to_string()));
    }

    let codes = match request.working_days {
        Some(Value::Array(codes)) => codes,
        _ => return Err(ScheduleError::InvalidInput("workingDays must be an array.".to_string())),
    };
    if codes.is_empty() {
        return Err(ScheduleError::InvalidInput("workingDays must not be empty.".to_string()));
    }
    let mut working_days = Vec::with_capacity(codes.len());
    for code in &codes {
        let day = code
            .as_str()
            .and_then(|c| Weekday::from_str(c).ok())
            .ok_or_else(|| ScheduleError::InvalidInput(format!("Invalid working day code: {}", code)))?;
        working_days.push(day);
    }

    let appointment_duration = match &request.appointment_duration {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .filter(|minutes| *minutes > 0)
    .ok_or_else(|| ScheduleError::InvalidInput("Invalid appointment duration.".to_string()))?;

    Ok(ScheduleSettings {
        doctor_id: doctor_id.to_string(),
        start_time,
        end_time,
        working_days: normalize_weekdays(working_days),
        appointment_duration,
        break_start_time,
        break_end_time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn request(body: Value) -> UpdateScheduleSettingsRequest {
        serde_json::from_value(body).unwrap()
    }

    fn full_body() -> Value {
        json!({
            "startTime": "09:00",
            "endTime": "17:30",
            "workingDays": ["Mon", "Tue", "Sat"],
            "appointmentDuration": "20",
            "breakStartTime": "12:00",
            "breakEndTime": "12:40"
        })
    }

    #[test]
    fn test_valid_request() {
        let settings = validate_settings_request("doc", request(full_body())).unwrap();
        assert_eq!(settings.start_time, NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        assert_eq!(settings.end_time, NaiveTime::from_hms_opt(17, 30, 0).unwrap());
        assert_eq!(settings.working_days, vec![Weekday::Mon, Weekday::Tue, Weekday::Sat]);
        assert_eq!(settings.appointment_duration, 20);
    }

    #[test]
    fn test_missing_field() {
        let mut body = full_body();
        body.as_object_mut().unwrap().remove("breakEndTime");
        assert_matches!(
            validate_settings_request("doc", request(body)),
            Err(ScheduleError::InvalidInput(msg)) if msg == "Missing required schedule settings fields."
        );
    }

    #[test]
    fn test_bad_values() {
        let mut body = full_body();
        body["workingDays"] = json!("Mon");
        assert_matches!(validate_settings_request("doc", request(body)), Err(ScheduleError::InvalidInput(_)));

        let mut body = full_body();
        body["workingDays"] = json!([]);
        assert_matches!(validate_settings_request("doc", request(body)), Err(ScheduleError::InvalidInput(_)));

        let mut body = full_body();
        body["workingDays"] = json!(["Mon", "Moonday"]);
        assert_matches!(validate_settings_request("doc", request(body)), Err(ScheduleError::InvalidInput(_)));

        let mut body = full_body();
        body["appointmentDuration"] = json!(0);
        assert_matches!(
            validate_settings_request("doc", request(body)),
            Err(ScheduleError::InvalidInput(msg)) if msg == "Invalid appointment duration."
        );

        let mut body = full_body();
        body["endTime"] = json!("08:00");
        assert_matches!(validate_settings_request("doc", request(body)), Err(ScheduleError::InvalidInput(_)));
    }
}
