use std::collections::HashSet;
use std::sync::Arc;

use anyhow::anyhow;
use chrono::{Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime};
use reqwest::Method;
use serde_json::json;
use tracing::{debug, error, info, warn};

use reminder_cell::{ReminderRequest, ReminderScheduler};
use schedule_cell::{AvailabilityService, ScheduleSettingsService};
use shared_config::AppConfig;
use shared_database::supabase::{is_unique_violation, SupabaseClient};
use shared_models::auth::User;
use shared_models::datetime::{format_wire_datetime, parse_wire_datetime, query_datetime};

use crate::error::AppointmentError;
use crate::models::{Appointment, AppointmentStatus};

pub struct AppointmentBookingService {
    supabase: SupabaseClient,
    settings: ScheduleSettingsService,
    availability: AvailabilityService,
    reminders: Arc<ReminderScheduler>,
    doctor_id: String,
    clinic_offset: FixedOffset,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig, reminders: Arc<ReminderScheduler>) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            settings: ScheduleSettingsService::new(config),
            availability: AvailabilityService::new(config),
            reminders,
            doctor_id: config.clinic_doctor_id.clone(),
            clinic_offset: config.clinic_utc_offset,
        }
    }

    /// `appointment_date` as sent by the client, in clinic-local time.
    pub fn parse_requested(&self, raw: Option<&str>) -> Result<NaiveDateTime, AppointmentError> {
        let raw = raw
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| AppointmentError::InvalidInput("appointment_date is required.".to_string()))?;

        parse_wire_datetime(raw, &self.clinic_offset)
            .ok_or_else(|| AppointmentError::InvalidInput("Invalid date/time format provided.".to_string()))
    }

    /// Validates the requested slot, stores a pending appointment and arms its reminders.
    pub async fn book_appointment(
        &self,
        patient: &User,
        requested: Option<&str>,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let at = self.parse_requested(requested)?;
        let doctor_id = self.clinic_doctor()?;
        debug!("Patient {} requests {} with doctor {}", patient.id, at, doctor_id);

        let policy = self.settings.policy_for(doctor_id, auth_token).await?;
        if let Err(violation) = policy.check(&at) {
            warn!("Booking rejected for {}: {}", at, violation);
            return Err(violation.into());
        }

        if self.availability.is_day_blocked(doctor_id, at.date(), auth_token).await? {
            warn!("Booking rejected for {}: day is blocked", at);
            return Err(AppointmentError::DayUnavailable);
        }

        if self.availability.is_slot_blocked(doctor_id, at, auth_token).await? {
            warn!("Booking rejected for {}: slot is blocked", at);
            return Err(AppointmentError::SlotBlocked);
        }

        if self.is_slot_taken(at, auth_token).await? {
            warn!("Booking rejected for {}: slot already booked", at);
            return Err(AppointmentError::SlotTaken);
        }

        let appointment = self.insert_appointment(&patient.id, doctor_id, at, auth_token).await?;
        info!("Appointment {} booked for patient {} at {}", appointment.id, patient.id, at);

        self.arm_reminders(&appointment, patient).await;

        Ok(appointment)
    }

    async fn insert_appointment(
        &self,
        patient_id: &str,
        doctor_id: &str,
        at: NaiveDateTime,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let body = json!({
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_datetime": format_wire_datetime(&at),
            "status": AppointmentStatus::Pending.as_str(),
        });

        let result: Result<Vec<Appointment>, _> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/appointments",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) if is_unique_violation(&e) => {
                warn!("Lost the race for {}: unique constraint rejected insert", at);
                return Err(AppointmentError::SlotTaken);
            }
            Err(e) => return Err(e.into()),
        };

        rows.into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Storage(anyhow!("Insert into appointments returned no row")))
    }

    async fn arm_reminders(&self, appointment: &Appointment, patient: &User) {
        let Some(recipient) = patient.email.clone().filter(|email| !email.is_empty()) else {
            warn!("Patient {} has no email, no reminders armed for {}", patient.id, appointment.id);
            return;
        };

        let request = ReminderRequest {
            appointment_id: appointment.id,
            appointment_datetime: appointment.appointment_datetime,
            recipient,
        };

        if let Err(e) = self.reminders.schedule_for(&request).await {
            error!("Failed to arm reminders for appointment {}: {}", appointment.id, e);
        }
    }

    pub async fn is_slot_taken(&self, at: NaiveDateTime, auth_token: &str) -> Result<bool, AppointmentError> {
        let path = format!(
            "/rest/v1/appointments?appointment_datetime=eq.{}{}&select=id&limit=1",
            query_datetime(&at),
            self.doctor_filter()
        );
        let rows: Vec<serde_json::Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!rows.is_empty())
    }

    /// Doctors see the clinic's whole calendar, everyone else only their own.
    pub async fn list_appointments(&self, user: &User, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let scope = if user.is_doctor() {
            self.doctor_filter()
        } else {
            format!("&patient_id=eq.{}", user.id)
        };
        let path = format!("/rest/v1/appointments?order=appointment_datetime.asc{}", scope);

        let appointments: Vec<Appointment> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        debug!("Listed {} appointments for user {}", appointments.len(), user.id);
        Ok(appointments)
    }

    /// Free starts on `date`: the slot grid minus blocked and booked times.
    pub async fn available_slots(&self, date: NaiveDate, auth_token: &str) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        let doctor_id = self.clinic_doctor()?;
        let policy = self.settings.policy_for(doctor_id, auth_token).await?;

        let grid = policy.slot_grid(date);
        if grid.is_empty() {
            return Ok(grid);
        }

        if self.availability.is_day_blocked(doctor_id, date, auth_token).await? {
            debug!("{} is blocked for doctor {}", date, doctor_id);
            return Ok(Vec::new());
        }

        let mut taken: HashSet<NaiveDateTime> = self.availability
            .blocked_slots_on(doctor_id, date, auth_token)
            .await?
            .into_iter()
            .map(|slot| slot.slot_datetime)
            .collect();
        taken.extend(self.booked_on(date, auth_token).await?);

        Ok(grid.into_iter().filter(|slot| !taken.contains(slot)).collect())
    }

    async fn booked_on(&self, date: NaiveDate, auth_token: &str) -> Result<Vec<NaiveDateTime>, AppointmentError> {
        let day_start = date.and_time(NaiveTime::MIN);
        let next_day = day_start + Duration::days(1);
        let path = format!(
            "/rest/v1/appointments?appointment_datetime=gte.{}&appointment_datetime=lt.{}{}",
            query_datetime(&day_start),
            query_datetime(&next_day),
            self.doctor_filter()
        );

        let appointments: Vec<Appointment> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(appointments.into_iter().map(|a| a.appointment_datetime).collect())
    }

    fn clinic_doctor(&self) -> Result<&str, AppointmentError> {
        if self.doctor_id.is_empty() {
            return Err(AppointmentError::Storage(anyhow!("CLINIC_DOCTOR_ID is not configured")));
        }
        Ok(&self.doctor_id)
    }

    fn doctor_filter(&self) -> String {
        if self.doctor_id.is_empty() {
            String::new()
        } else {
            format!("&doctor_id=eq.{}", self.doctor_id)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use reminder_cell::InMemoryReminderQueue;
    use shared_utils::test_utils::TestConfig;

    fn service() -> AppointmentBookingService {
        let config = TestConfig::default().to_app_config();
        let reminders = Arc::new(ReminderScheduler::new(&config, Arc::new(InMemoryReminderQueue::new())));
        AppointmentBookingService::new(&config, reminders)
    }

    #[test]
    fn test_parse_requested_accepts_wire_forms() {
        let service = service();
        let expected = NaiveDateTime::parse_from_str("2025-03-10 14:00:00", "%Y-%m-%d %H:%M:%S").unwrap();

        assert_eq!(service.parse_requested(Some("2025-03-10 14:00")).unwrap(), expected);
        assert_eq!(service.parse_requested(Some("2025-03-10T14:00:42")).unwrap(), expected);
        // 08:30 UTC is 14:00 at +05:30
        assert_eq!(service.parse_requested(Some("2025-03-10T08:30:00Z")).unwrap(), expected);
    }

    #[test]
    fn test_parse_requested_rejects_missing_and_garbage() {
        let service = service();

        assert_matches!(
            service.parse_requested(None),
            Err(AppointmentError::InvalidInput(msg)) if msg == "appointment_date is required."
        );
        assert_matches!(
            service.parse_requested(Some("  ")),
            Err(AppointmentError::InvalidInput(msg)) if msg == "appointment_date is required."
        );
        assert_matches!(
            service.parse_requested(Some("next tuesday")),
            Err(AppointmentError::InvalidInput(msg)) if msg == "Invalid date/time format provided."
        );
    }
}
