use chrono::{Duration, NaiveDate, NaiveDateTime};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::AppConfig;
use shared_database::supabase::{is_unique_violation, SupabaseClient};
use shared_models::datetime::{format_wire_datetime, query_datetime, truncate_to_minute, WIRE_DATE_FORMAT};

use crate::error::ScheduleError;
use crate::models::{BlockedDay, BlockedSlot};
use crate::services::settings::ScheduleSettingsService;

pub struct AvailabilityService {
    supabase: SupabaseClient,
    settings: ScheduleSettingsService,
}

impl AvailabilityService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            supabase: SupabaseClient::new(config),
            settings: ScheduleSettingsService::new(config),
        }
    }

    // ==========================================================================
    // BLOCKED DAYS
    // ==========================================================================

    pub async fn list_blocked_days(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<BlockedDay>, ScheduleError> {
        let path = format!("/rest/v1/blocked_days?doctor_id=eq.{}&order=block_date.asc", doctor_id);
        let days: Vec<BlockedDay> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        debug!("Doctor {} has {} blocked days", doctor_id, days.len());
        Ok(days)
    }

    pub async fn block_day(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<BlockedDay, ScheduleError> {
        let body = json!({
            "doctor_id": doctor_id,
            "block_date": date.format(WIRE_DATE_FORMAT).to_string(),
            "reason": reason,
        });

        let result: Result<Vec<BlockedDay>, _> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/blocked_days",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) if is_unique_violation(&e) => {
                warn!("Day {} already blocked for doctor {}", date, doctor_id);
                return Err(ScheduleError::DuplicateBlock("This day is already blocked.".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let blocked = rows
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Storage(anyhow::anyhow!("Insert into blocked_days returned no row")))?;

        info!("Blocked day {} for doctor {}", date, doctor_id);
        Ok(blocked)
    }

    pub async fn unblock_day(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_days?doctor_id=eq.{}&block_date=eq.{}",
            doctor_id,
            date.format(WIRE_DATE_FORMAT)
        );
        let removed: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if removed.is_empty() {
            return Err(ScheduleError::NotFound("Blocked day not found.".to_string()));
        }

        info!("Unblocked day {} for doctor {}", date, doctor_id);
        Ok(())
    }

    pub async fn is_day_blocked(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_days?doctor_id=eq.{}&block_date=eq.{}&select=id&limit=1",
            doctor_id,
            date.format(WIRE_DATE_FORMAT)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!rows.is_empty())
    }

    // ==========================================================================
    // BLOCKED SLOTS
    // ==========================================================================

    pub async fn list_blocked_slots(
        &self,
        doctor_id: &str,
        auth_token: &str,
    ) -> Result<Vec<BlockedSlot>, ScheduleError> {
        let path = format!("/rest/v1/blocked_time_slots?doctor_id=eq.{}&order=slot_datetime.asc", doctor_id);
        let slots: Vec<BlockedSlot> = self.supabase.request(
            Method::GET,
            &path,
            Some(auth_token),
            None,
        ).await?;

        Ok(slots)
    }

    /// Blocked slots falling on one date, for slot listings.
    pub async fn blocked_slots_on(
        &self,
        doctor_id: &str,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<BlockedSlot>, ScheduleError> {
        let day_start = date.and_time(chrono::NaiveTime::MIN);
        let next_day = day_start + Duration::days(1);
        let path = format!(
            "/rest/v1/blocked_time_slots?doctor_id=eq.{}&slot_datetime=gte.{}&slot_datetime=lt.{}&order=slot_datetime.asc",
            doctor_id,
            query_datetime(&day_start),
            query_datetime(&next_day)
        );
        let slots: Vec<BlockedSlot> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(slots)
    }

    pub async fn block_slot(
        &self,
        doctor_id: &str,
        slot_datetime: NaiveDateTime,
        reason: Option<String>,
        auth_token: &str,
    ) -> Result<BlockedSlot, ScheduleError> {
        let slot_datetime = truncate_to_minute(slot_datetime);

        let policy = self.settings.policy_for(doctor_id, auth_token).await?;
        if let Err(violation) = policy.check(&slot_datetime) {
            warn!("Refusing to block {} for doctor {}: {}", slot_datetime, doctor_id, violation);
            return Err(ScheduleError::InvalidSlot(violation));
        }

        let body = json!({
            "doctor_id": doctor_id,
            "slot_datetime": format_wire_datetime(&slot_datetime),
            "reason": reason,
        });

        let result: Result<Vec<BlockedSlot>, _> = self.supabase.request_with_headers(
            Method::POST,
            "/rest/v1/blocked_time_slots",
            Some(auth_token),
            Some(body),
            Some(SupabaseClient::representation_headers()),
        ).await;

        let rows = match result {
            Ok(rows) => rows,
            Err(e) if is_unique_violation(&e) => {
                return Err(ScheduleError::DuplicateBlock(
                    "This specific time slot is already blocked.".to_string(),
                ));
            }
            Err(e) => return Err(e.into()),
        };

        let blocked = rows
            .into_iter()
            .next()
            .ok_or_else(|| ScheduleError::Storage(anyhow::anyhow!("Insert into blocked_time_slots returned no row")))?;

        info!("Blocked slot {} for doctor {}", slot_datetime, doctor_id);
        Ok(blocked)
    }

    pub async fn unblock_slot(
        &self,
        doctor_id: &str,
        slot_datetime: NaiveDateTime,
        auth_token: &str,
    ) -> Result<(), ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_time_slots?doctor_id=eq.{}&slot_datetime=eq.{}",
            doctor_id,
            query_datetime(&slot_datetime)
        );
        let removed: Vec<Value> = self.supabase.request_with_headers(
            Method::DELETE,
            &path,
            Some(auth_token),
            None,
            Some(SupabaseClient::representation_headers()),
        ).await?;

        if removed.is_empty() {
            return Err(ScheduleError::NotFound("Blocked time slot not found.".to_string()));
        }

        info!("Unblocked slot {} for doctor {}", slot_datetime, doctor_id);
        Ok(())
    }

    pub async fn is_slot_blocked(
        &self,
        doctor_id: &str,
        slot_datetime: NaiveDateTime,
        auth_token: &str,
    ) -> Result<bool, ScheduleError> {
        let path = format!(
            "/rest/v1/blocked_time_slots?doctor_id=eq.{}&slot_datetime=eq.{}&select=id&limit=1",
            doctor_id,
            query_datetime(&slot_datetime)
        );
        let rows: Vec<Value> = self.supabase.request(Method::GET, &path, Some(auth_token), None).await?;
        Ok(!rows.is_empty())
    }
}
