use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Claims of a Supabase access token.
#[derive(Debug, Deserialize)]
pub struct JwtClaims {
    pub sub: String,
    pub exp: Option<i64>,
    pub iat: Option<i64>,
    pub email: Option<String>,
    pub role: Option<String>,
    #[serde(default)]
    pub app_metadata: Option<Value>,
    #[serde(default)]
    pub user_metadata: Option<Value>,
}

impl JwtClaims {
    /// Supabase puts the platform role in `app_metadata.role`; the top level
    /// `role` claim is usually just `authenticated`.
    pub fn platform_role(&self) -> Option<String> {
        let from_metadata = |meta: &Option<Value>| {
            meta.as_ref()
                .and_then(|m| m.get("role"))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        from_metadata(&self.app_metadata)
            .or_else(|| from_metadata(&self.user_metadata))
            .or_else(|| self.role.clone())
    }
}

/// Caller attached to the request by the auth middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: Option<String>,
    /// `doctor`/`physician` or `patient`; anything else can't act on bookings.
    pub role: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
}
