use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{TimeZone, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

use shared_models::auth::{JwtClaims, User};

type HmacSha256 = Hmac<Sha256>;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum TokenError {
    #[error("JWT secret is not set")]
    MissingSecret,
    #[error("Invalid token format")]
    Malformed,
    #[error("Invalid signature encoding")]
    SignatureEncoding,
    #[error("Invalid token signature")]
    BadSignature,
    #[error("Invalid claims")]
    BadClaims,
    #[error("Token expired")]
    Expired,
}

pub fn validate_token(token: &str, jwt_secret: &str) -> Result<User, TokenError> {
    if jwt_secret.is_empty() {
        return Err(TokenError::MissingSecret);
    }

    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(TokenError::Malformed);
    }

    let (header_b64, claims_b64, signature_b64) = (parts[0], parts[1], parts[2]);

    let signature = URL_SAFE_NO_PAD.decode(signature_b64).map_err(|e| {
        debug!("Failed to decode signature: {}", e);
        TokenError::SignatureEncoding
    })?;

    let mut mac = HmacSha256::new_from_slice(jwt_secret.as_bytes())
        .map_err(|_| TokenError::MissingSecret)?;
    mac.update(format!("{}.{}", header_b64, claims_b64).as_bytes());

    if mac.verify_slice(&signature).is_err() {
        debug!("Token signature verification failed");
        return Err(TokenError::BadSignature);
    }

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .ok_or(TokenError::BadClaims)?;

    let claims: JwtClaims = serde_json::from_str(&claims_json).map_err(|e| {
        debug!("Failed to parse claims: {}", e);
        TokenError::BadClaims
    })?;

    let expires_at = claims
        .exp
        .and_then(|timestamp| Utc.timestamp_opt(timestamp, 0).single());
    if let Some(exp) = expires_at {
        let now = Utc::now();
        if exp < now {
            debug!("Token expired at {} (now: {})", exp, now);
            return Err(TokenError::Expired);
        }
    }

    let user = User {
        role: claims.platform_role(),
        id: claims.sub,
        email: claims.email,
        token_expires_at: expires_at,
    };

    debug!("Token validated successfully for user: {}", user.id);
    Ok(user)
}
