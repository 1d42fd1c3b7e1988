use anyhow::{anyhow, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Postgres `unique_violation`.
const UNIQUE_VIOLATION_CODE: &str = "23505";

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl SupabaseError {
    fn from_response(status: u16, body: &str) -> Self {
        let code = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v.get("code").and_then(Value::as_str).map(str::to_owned));

        match (status, code.as_deref()) {
            (_, Some(UNIQUE_VIOLATION_CODE)) | (409, _) => SupabaseError::UniqueViolation(body.to_string()),
            (401 | 403, _) => SupabaseError::Auth(body.to_string()),
            (404, _) => SupabaseError::NotFound(body.to_string()),
            _ => SupabaseError::Api { status, message: body.to_string() },
        }
    }
}

pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::UniqueViolation(_)))
}

pub fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::NotFound(_)))
}

pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         extra_headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);
            return Err(SupabaseError::from_response(status.as_u16(), &error_text).into());
        }

        let text = response.text().await?;
        // PostgREST answers writes without `return=representation` with an empty body
        let text = if text.trim().is_empty() { "null" } else { text.as_str() };
        serde_json::from_str::<T>(text)
            .map_err(|e| anyhow!("Failed to decode response from {}: {}", path, e))
    }

    /// `Prefer: return=representation` for writes that should echo the affected rows.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    /// Upsert on the table's conflict target, returning the merged row.
    pub fn upsert_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Prefer",
            HeaderValue::from_static("resolution=merge-duplicates,return=representation"),
        );
        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_violation_detected_from_code() {
        let body = r#"{"code":"23505","message":"duplicate key value violates unique constraint"}"#;
        let err: anyhow::Error = SupabaseError::from_response(400, body).into();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn test_conflict_status_is_unique_violation() {
        let err: anyhow::Error = SupabaseError::from_response(409, "conflict").into();
        assert!(is_unique_violation(&err));
        assert!(!is_not_found(&err));
    }

    #[test]
    fn test_other_statuses() {
        let err: anyhow::Error = SupabaseError::from_response(404, "missing").into();
        assert!(is_not_found(&err));

        let err: anyhow::Error = SupabaseError::from_response(500, "boom").into();
        assert!(!is_unique_violation(&err));
        assert!(matches!(err.downcast_ref::<SupabaseError>(), Some(SupabaseError::Api { status: 500, .. })));
    }
}
