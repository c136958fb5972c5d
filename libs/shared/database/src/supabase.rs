use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error};

use shared_config::AppConfig;

#[derive(Error, Debug)]
pub enum SupabaseError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Unique or exclusion constraint violation (HTTP 409).
    #[error("Constraint conflict: {0}")]
    Conflict(String),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid header value: {0}")]
    InvalidHeader(String),
}

impl SupabaseError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, SupabaseError::Conflict(_))
    }
}

/// PostgREST client. Scheduling code runs outside of any end-user request
/// (sweeps, webhooks), so it authenticates with the service role key.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            api_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, SupabaseError> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let token = auth_token.unwrap_or(&self.api_key);
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| SupabaseError::InvalidHeader(e.to_string()))?,
        );

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T, SupabaseError>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status {
                StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => SupabaseError::Auth(error_text),
                StatusCode::NOT_FOUND => SupabaseError::NotFound(error_text),
                StatusCode::CONFLICT => SupabaseError::Conflict(error_text),
                _ => SupabaseError::Api {
                    status: status.as_u16(),
                    message: error_text,
                },
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Headers asking PostgREST to echo the written rows back.
    pub fn return_representation() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("Prefer", HeaderValue::from_static("return=representation"));
        headers
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}
