use std::env;
use std::str::FromStr;

use chrono::{FixedOffset, Offset, Utc, Weekday};
use tracing::warn;

pub const DEFAULT_UTC_OFFSET: &str = "+05:30";
pub const DEFAULT_REMINDER_LEAD_MINUTES: &[i64] = &[720, 150];

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_jwt_secret: String,
    pub redis_url: Option<String>,
    pub clinic_doctor_id: String,
    pub clinic_name: String,
    pub clinic_utc_offset: FixedOffset,
    pub clinic_closed_days: Vec<Weekday>,
    pub reminder_lead_minutes: Vec<i64>,
    pub reminder_poll_seconds: u64,
    pub notifier_url: Option<String>,
    pub notifier_api_key: String,
    pub notifier_from: String,
    pub app_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let config = Self {
            supabase_url: env::var("SUPABASE_URL")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_URL not set, using empty value");
                    String::new()
                }),
            supabase_anon_key: env::var("SUPABASE_ANON_PUBLIC_KEY")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_ANON_PUBLIC_KEY not set, using empty value");
                    String::new()
                }),
            supabase_jwt_secret: env::var("SUPABASE_JWT_SECRET")
                .unwrap_or_else(|_| {
                    warn!("SUPABASE_JWT_SECRET not set, using empty value");
                    String::new()
                }),
            redis_url: env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            clinic_doctor_id: env::var("CLINIC_DOCTOR_ID")
                .unwrap_or_else(|_| {
                    warn!("CLINIC_DOCTOR_ID not set, using empty value");
                    String::new()
                }),
            clinic_name: env::var("CLINIC_NAME")
                .unwrap_or_else(|_| "the clinic".to_string()),
            clinic_utc_offset: env::var("CLINIC_UTC_OFFSET")
                .ok()
                .and_then(|raw| {
                    let parsed = parse_utc_offset(&raw);
                    if parsed.is_none() {
                        warn!("CLINIC_UTC_OFFSET '{}' is not a valid offset, using {}", raw, DEFAULT_UTC_OFFSET);
                    }
                    parsed
                })
                .unwrap_or_else(default_utc_offset),
            clinic_closed_days: env::var("CLINIC_CLOSED_DAYS")
                .map(|raw| parse_weekdays(&raw))
                .unwrap_or_else(|_| vec![Weekday::Sun]),
            reminder_lead_minutes: env::var("REMINDER_LEAD_MINUTES")
                .ok()
                .and_then(|raw| {
                    let parsed = parse_lead_minutes(&raw);
                    if parsed.is_none() {
                        warn!("REMINDER_LEAD_MINUTES '{}' is invalid, using defaults", raw);
                    }
                    parsed
                })
                .unwrap_or_else(|| DEFAULT_REMINDER_LEAD_MINUTES.to_vec()),
            reminder_poll_seconds: env::var("REMINDER_POLL_SECONDS")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .filter(|secs| *secs > 0)
                .unwrap_or(30),
            notifier_url: env::var("NOTIFIER_URL").ok().filter(|url| !url.is_empty()),
            notifier_api_key: env::var("NOTIFIER_API_KEY").unwrap_or_default(),
            notifier_from: env::var("NOTIFIER_FROM")
                .unwrap_or_else(|_| "no-reply@clinic.local".to_string()),
            app_port: env::var("APP_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(3000),
        };

        if !config.is_configured() {
            warn!("Application not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_anon_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
            && !self.clinic_doctor_id.is_empty()
    }
}

pub fn default_utc_offset() -> FixedOffset {
    FixedOffset::east_opt(5 * 3600 + 30 * 60).unwrap_or_else(|| Utc.fix())
}

/// Parses `+HH:MM`, `-HH:MM` or `Z`.
pub fn parse_utc_offset(raw: &str) -> Option<FixedOffset> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case("z") || raw == "UTC" {
        return FixedOffset::east_opt(0);
    }

    let (sign, rest) = match raw.chars().next()? {
        '+' => (1, &raw[1..]),
        '-' => (-1, &raw[1..]),
        _ => return None,
    };
    let (hours, minutes) = rest.split_once(':').unwrap_or((rest, "0"));
    let hours: i32 = hours.parse().ok()?;
    let minutes: i32 = minutes.parse().ok()?;
    if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
        return None;
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
}

/// Comma separated weekday codes; unrecognized entries are dropped.
pub fn parse_weekdays(raw: &str) -> Vec<Weekday> {
    let mut days = Vec::new();
    for code in raw.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        match Weekday::from_str(code) {
            Ok(day) if !days.contains(&day) => days.push(day),
            Ok(_) => {}
            Err(_) => warn!("Ignoring unrecognized weekday code '{}'", code),
        }
    }
    days
}

pub fn parse_lead_minutes(raw: &str) -> Option<Vec<i64>> {
    let leads = raw
        .split(',')
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| v.parse::<i64>().ok().filter(|m| *m > 0))
        .collect::<Option<Vec<_>>>()?;

    if leads.is_empty() {
        None
    } else {
        Some(leads)
    }
}
