// libs/video-conferencing-cell/src/services/room.rs
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::AppConfig;

use crate::models::{CloudflareSessionResponse, SessionError};

#[derive(Debug, Error)]
pub enum RoomError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Room provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected room provider response: {0}")]
    Decode(String),
}

impl From<RoomError> for SessionError {
    fn from(err: RoomError) -> Self {
        SessionError::Room(err.to_string())
    }
}

/// Hands out opaque room identifiers. Media transport is the client's and
/// the provider's business.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RoomProvider: Send + Sync {
    async fn allocate_room(&self, appointment_id: Uuid) -> Result<String, RoomError>;

    async fn release_room(&self, room_id: &str) -> Result<(), RoomError> {
        debug!("Room {} released", room_id);
        Ok(())
    }
}

/// Cloudflare Realtime: a new Realtime session per consultation; its id is
/// the room id both participants connect to.
/// Based on: https://developers.cloudflare.com/realtime/
pub struct CloudflareRoomProvider {
    client: Client,
    app_id: String,
    api_token: String,
    base_url: String,
}

impl CloudflareRoomProvider {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            app_id: config.cloudflare_realtime_app_id.clone(),
            api_token: config.cloudflare_realtime_api_token.clone(),
            base_url: config.cloudflare_realtime_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl RoomProvider for CloudflareRoomProvider {
    async fn allocate_room(&self, appointment_id: Uuid) -> Result<String, RoomError> {
        let url = format!("{}/apps/{}/sessions/new", self.base_url, self.app_id);
        debug!("Allocating Cloudflare session for appointment {}", appointment_id);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_token))
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            error!("Cloudflare session creation failed: {} - {}", status, body);
            return Err(RoomError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let session: CloudflareSessionResponse = serde_json::from_str(&body)
            .map_err(|e| RoomError::Decode(format!("Failed to parse session response: {}", e)))?;

        if let Some(code) = session.error_code {
            return Err(RoomError::Api {
                status: status.as_u16(),
                message: format!(
                    "{}: {}",
                    code,
                    session.error_description.unwrap_or_default()
                ),
            });
        }

        let room_id = session
            .session_id
            .ok_or_else(|| RoomError::Decode("response has no sessionId".to_string()))?;

        info!("Cloudflare session {} allocated for appointment {}", room_id, appointment_id);
        Ok(room_id)
    }
}

/// Used when Cloudflare is not configured.
#[derive(Debug, Default)]
pub struct LocalRoomProvider;

#[async_trait]
impl RoomProvider for LocalRoomProvider {
    async fn allocate_room(&self, appointment_id: Uuid) -> Result<String, RoomError> {
        let room_id = format!("room_{}", Uuid::new_v4().simple());
        debug!("Local room {} for appointment {}", room_id, appointment_id);
        Ok(room_id)
    }
}
