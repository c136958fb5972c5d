// libs/video-conferencing-cell/src/models.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentStatus};
use shared_models::{ActorRole, AppError};

/// Live state of an IN_PROGRESS appointment. Only heartbeat instants live
/// here; the durable presence flags are on the appointment.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub appointment_id: Uuid,
    pub room_id: String,
    pub started_at: DateTime<Utc>,
    pub physician_seen_at: Option<DateTime<Utc>>,
    pub patient_seen_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(appointment_id: Uuid, room_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            appointment_id,
            room_id,
            started_at,
            physician_seen_at: None,
            patient_seen_at: None,
        }
    }

    pub fn touch(&mut self, role: ActorRole, now: DateTime<Utc>) {
        match role {
            ActorRole::Physician => self.physician_seen_at = Some(now),
            ActorRole::Patient => self.patient_seen_at = Some(now),
            ActorRole::System => {}
        }
    }

    pub fn seen_at(&self, role: ActorRole) -> Option<DateTime<Utc>> {
        match role {
            ActorRole::Physician => self.physician_seen_at,
            ActorRole::Patient => self.patient_seen_at,
            ActorRole::System => None,
        }
    }

    /// A participant counts as present only with a recent heartbeat.
    pub fn is_present(&self, role: ActorRole, now: DateTime<Utc>, timeout: Duration) -> bool {
        self.seen_at(role).is_some_and(|seen| now - seen <= timeout)
    }

    pub fn presence(&self, now: DateTime<Utc>, timeout: Duration) -> Presence {
        Presence {
            physician: self.is_present(ActorRole::Physician, now, timeout),
            patient: self.is_present(ActorRole::Patient, now, timeout),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Presence {
    pub physician: bool,
    pub patient: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SessionView {
    pub appointment_id: Uuid,
    pub status: AppointmentStatus,
    pub room_id: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub presence: Presence,
    pub heartbeat_interval_seconds: i64,
}

// Cloudflare Realtime: POST /apps/{appId}/sessions/new
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudflareSessionResponse {
    pub session_id: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Not a participant of this appointment")]
    Unauthorized,

    #[error("Cannot {action} a session whose appointment is {current}")]
    InvalidState {
        current: AppointmentStatus,
        action: &'static str,
    },

    #[error("Session can't be started before {opens_at}")]
    TooEarly { opens_at: DateTime<Utc> },

    #[error("Video room provider error: {0}")]
    Room(String),

    #[error(transparent)]
    Appointment(AppointmentError),
}

impl From<AppointmentError> for SessionError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotParticipant => SessionError::Unauthorized,
            AppointmentError::InvalidState { current, action } => {
                SessionError::InvalidState { current, action }
            }
            other => SessionError::Appointment(other),
        }
    }
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::Unauthorized => AppError::Forbidden(err.to_string()),
            SessionError::InvalidState { .. } | SessionError::TooEarly { .. } => {
                AppError::Conflict(err.to_string())
            }
            SessionError::Room(msg) => AppError::ExternalService(msg),
            SessionError::Appointment(inner) => inner.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn presence_goes_stale_after_timeout() {
        let start = Utc.with_ymd_and_hms(2026, 3, 3, 9, 0, 0).unwrap();
        let mut session = Session::new(Uuid::new_v4(), "room".to_string(), start);
        session.touch(ActorRole::Physician, start);

        let timeout = Duration::seconds(45);
        assert_eq!(
            session.presence(start + Duration::seconds(45), timeout),
            Presence { physician: true, patient: false }
        );
        assert!(!session.is_present(ActorRole::Physician, start + Duration::seconds(46), timeout));
    }

    #[test]
    fn ledger_errors_keep_their_meaning() {
        let err: SessionError = AppointmentError::NotParticipant.into();
        assert!(matches!(err, SessionError::Unauthorized));

        let err: SessionError = AppointmentError::InvalidState {
            current: AppointmentStatus::Completed,
            action: "end",
        }
        .into();
        let app: AppError = err.into();
        assert_eq!(app.status_code(), axum::http::StatusCode::CONFLICT);
    }
}
