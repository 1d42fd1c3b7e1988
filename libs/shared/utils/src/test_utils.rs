use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::{Duration, FixedOffset, Utc, Weekday};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::User;

pub struct TestConfig {
    pub jwt_secret: String,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub doctor_id: String,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "test-secret-key-for-jwt-validation-must-be-long-enough".to_string(),
            supabase_url: "http://localhost:54321".to_string(),
            supabase_anon_key: "test-anon-key".to_string(),
            doctor_id: Uuid::new_v4().to_string(),
        }
    }
}

impl TestConfig {
    pub fn to_app_config(&self) -> AppConfig {
        AppConfig {
            supabase_url: self.supabase_url.clone(),
            supabase_anon_key: self.supabase_anon_key.clone(),
            supabase_jwt_secret: self.jwt_secret.clone(),
            redis_url: None,
            clinic_doctor_id: self.doctor_id.clone(),
            clinic_name: "MediSync".to_string(),
            clinic_utc_offset: FixedOffset::east_opt(19800).expect("valid offset"),
            clinic_closed_days: vec![Weekday::Sun],
            reminder_lead_minutes: vec![720, 150],
            reminder_poll_seconds: 1,
            notifier_url: None,
            notifier_api_key: String::new(),
            notifier_from: "reminders@medisync.test".to_string(),
            app_port: 0,
        }
    }

    pub fn to_arc(&self) -> Arc<AppConfig> {
        Arc::new(self.to_app_config())
    }
}

pub struct TestUser {
    pub id: String,
    pub email: String,
    pub role: String,
}

impl Default for TestUser {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: "test@example.com".to_string(),
            role: "patient".to_string(),
        }
    }
}

impl TestUser {
    pub fn new(email: &str, role: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            email: email.to_string(),
            role: role.to_string(),
        }
    }

    pub fn doctor(email: &str) -> Self {
        Self::new(email, "doctor")
    }

    pub fn patient(email: &str) -> Self {
        Self::new(email, "patient")
    }

    /// The clinic doctor configured in `config`.
    pub fn clinic_doctor(config: &AppConfig) -> Self {
        Self {
            id: config.clinic_doctor_id.clone(),
            email: "doctor@medisync.test".to_string(),
            role: "doctor".to_string(),
        }
    }

    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: Some(self.email.clone()),
            role: Some(self.role.clone()),
            metadata: None,
            created_at: Some(Utc::now()),
        }
    }
}

pub struct JwtTestUtils;

impl JwtTestUtils {
    pub fn create_test_token(user: &TestUser, secret: &str, exp_hours: Option<i64>) -> String {
        let now = Utc::now();
        let exp = now + Duration::hours(exp_hours.unwrap_or(24));

        let header = json!({
            "alg": "HS256",
            "typ": "JWT"
        });

        let payload = json!({
            "sub": user.id,
            "email": user.email,
            "role": user.role,
            "iat": now.timestamp(),
            "exp": exp.timestamp()
        });

        let header_encoded = general_purpose::URL_SAFE_NO_PAD.encode(header.to_string());
        let payload_encoded = general_purpose::URL_SAFE_NO_PAD.encode(payload.to_string());

        let signing_input = format!("{}.{}", header_encoded, payload_encoded);

        let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
            .expect("HMAC can take key of any size");
        mac.update(signing_input.as_bytes());
        let signature = mac.finalize().into_bytes();
        let signature_encoded = general_purpose::URL_SAFE_NO_PAD.encode(signature);

        format!("{}.{}", signing_input, signature_encoded)
    }

    pub fn create_expired_token(user: &TestUser, secret: &str) -> String {
        Self::create_test_token(user, secret, Some(-1))
    }

    pub fn create_invalid_signature_token(user: &TestUser) -> String {
        Self::create_test_token(user, "wrong-secret", Some(24))
    }
}

/// PostgREST row shapes for wiremock responses.
pub struct MockSupabaseResponses;

impl MockSupabaseResponses {
    pub fn appointment_response(id: &str, patient_id: &str, doctor_id: &str, at: &str, status: &str) -> serde_json::Value {
        json!({
            "id": id,
            "patient_id": patient_id,
            "doctor_id": doctor_id,
            "appointment_datetime": at,
            "status": status,
            "created_at": "2025-03-01T09:00:00+00:00"
        })
    }

    pub fn blocked_day_response(doctor_id: &str, date: &str, reason: Option<&str>) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "block_date": date,
            "reason": reason
        })
    }

    pub fn blocked_slot_response(doctor_id: &str, at: &str, reason: Option<&str>) -> serde_json::Value {
        json!({
            "id": Uuid::new_v4(),
            "doctor_id": doctor_id,
            "slot_datetime": at,
            "reason": reason
        })
    }

    pub fn schedule_settings_response(doctor_id: &str, start: &str, end: &str, days: &[&str]) -> serde_json::Value {
        json!({
            "doctor_id": doctor_id,
            "start_time": start,
            "end_time": end,
            "working_days": days,
            "appointment_duration": 30,
            "break_start_time": "13:00:00",
            "break_end_time": "14:00:00"
        })
    }

    pub fn unique_violation_response(constraint: &str) -> serde_json::Value {
        json!({
            "code": "23505",
            "details": null,
            "hint": null,
            "message": format!("duplicate key value violates unique constraint \"{}\"", constraint)
        })
    }

    pub fn error_response(message: &str, code: &str) -> serde_json::Value {
        json!({
            "code": code,
            "message": message
        })
    }
}
