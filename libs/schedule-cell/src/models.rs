use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use shared_models::datetime::wire_datetime;

// ==============================================================================
// AVAILABILITY STORE
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedDay {
    pub id: Uuid,
    pub doctor_id: String,
    pub block_date: NaiveDate,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BlockedSlot {
    pub id: Uuid,
    pub doctor_id: String,
    #[serde(with = "wire_datetime")]
    pub slot_datetime: NaiveDateTime,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockDayRequest {
    pub block_date: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BlockSlotRequest {
    pub slot_datetime: Option<String>,
    pub reason: Option<String>,
}

// ==============================================================================
// SCHEDULE CONFIGURATION
// ==============================================================================

pub const DEFAULT_WORKING_DAYS: [Weekday; 5] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSettings {
    pub doctor_id: String,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    #[serde(deserialize_with = "deserialize_working_days")]
    pub working_days: Vec<Weekday>,
    pub appointment_duration: i64,
    pub break_start_time: NaiveTime,
    pub break_end_time: NaiveTime,
}

impl ScheduleSettings {
    /// Settings in effect for a doctor that never saved any.
    pub fn defaults_for(doctor_id: &str) -> Self {
        Self {
            doctor_id: doctor_id.to_string(),
            start_time: NaiveTime::from_hms_opt(11, 0, 0).unwrap_or(NaiveTime::MIN),
            end_time: NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN),
            working_days: DEFAULT_WORKING_DAYS.to_vec(),
            appointment_duration: 30,
            break_start_time: NaiveTime::from_hms_opt(13, 0, 0).unwrap_or(NaiveTime::MIN),
            break_end_time: NaiveTime::from_hms_opt(14, 0, 0).unwrap_or(NaiveTime::MIN),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateScheduleSettingsRequest {
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub working_days: Option<Value>,
    pub appointment_duration: Option<Value>,
    pub break_start_time: Option<String>,
    pub break_end_time: Option<String>,
}

/// Sorts Monday-first and removes duplicates.
pub fn normalize_weekdays(mut days: Vec<Weekday>) -> Vec<Weekday> {
    days.sort_by_key(|d| d.num_days_from_monday());
    days.dedup();
    days
}

/// Accepts a JSON array of codes or a JSON-encoded array stored as text.
/// Unrecognized codes are dropped.
fn deserialize_working_days<'de, D>(deserializer: D) -> Result<Vec<Weekday>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    let items = match raw {
        Value::Array(items) => items,
        Value::String(text) => serde_json::from_str::<Vec<Value>>(&text).unwrap_or_else(|e| {
            warn!("Stored working_days is not a JSON array ({}), treating as empty", e);
            Vec::new()
        }),
        Value::Null => Vec::new(),
        other => {
            warn!("Unexpected working_days value: {}", other);
            Vec::new()
        }
    };

    let days = items
        .iter()
        .filter_map(|item| {
            let code = item.as_str()?;
            match Weekday::from_str(code) {
                Ok(day) => Some(day),
                Err(_) => {
                    warn!("Dropping unrecognized working day code '{}'", code);
                    None
                }
            }
        })
        .collect();

    Ok(normalize_weekdays(days))
}
