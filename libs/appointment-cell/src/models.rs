// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use doctor_cell::{BookedInterval, DoctorError};
use patient_cell::PatientError;
use shared_models::{Actor, ActorRole, AppError};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Appointment {
    pub id: Uuid,
    pub physician_id: Uuid,
    pub patient_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
    /// Copied from the physician when the reservation is made.
    pub duration_minutes: i64,
    pub kind: AppointmentKind,
    pub status: AppointmentStatus,
    pub room_id: Option<String>,
    pub physician_present: bool,
    pub patient_present: bool,
    pub charge_id: Option<Uuid>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub cancelled_by: Option<ActorRole>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn ends_at(&self) -> DateTime<Utc> {
        self.scheduled_at + Duration::minutes(self.duration_minutes)
    }

    pub fn interval(&self) -> BookedInterval {
        BookedInterval {
            starts_at: self.scheduled_at,
            ends_at: self.ends_at(),
        }
    }

    pub fn overlaps(&self, other: &Appointment) -> bool {
        self.interval().overlaps(other.scheduled_at, other.ends_at())
    }

    pub fn is_participant(&self, actor: &Actor) -> bool {
        match actor.role {
            ActorRole::Physician => actor.id == self.physician_id,
            ActorRole::Patient => actor.id == self.patient_id,
            ActorRole::System => false,
        }
    }

    /// Paid by this charge and confirmed or further along.
    pub fn is_settled_by(&self, charge_id: Uuid) -> bool {
        self.charge_id == Some(charge_id)
            && matches!(
                self.status,
                AppointmentStatus::Confirmed
                    | AppointmentStatus::InProgress
                    | AppointmentStatus::Completed
            )
    }

    pub fn hold_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status == AppointmentStatus::Reserved
            && self.hold_expires_at.map_or(false, |expiry| expiry <= now)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Reserved,
    Confirmed,
    InProgress,
    Completed,
    Expired,
    Cancelled,
}

impl AppointmentStatus {
    /// Statuses that hold a slot on the physician's calendar.
    pub const ACTIVE: [AppointmentStatus; 3] = [
        AppointmentStatus::Reserved,
        AppointmentStatus::Confirmed,
        AppointmentStatus::InProgress,
    ];

    pub fn is_active(&self) -> bool {
        Self::ACTIVE.contains(self)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Expired | AppointmentStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AppointmentStatus::Reserved => "reserved",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::InProgress => "in_progress",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Expired => "expired",
            AppointmentStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentKind {
    #[serde(alias = "first-visit")]
    FirstVisit,
    #[serde(alias = "follow-up", alias = "followup")]
    FollowUp,
}

// ==============================================================================
// REQUEST / RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct SlotQuery {
    pub physician_id: Uuid,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveAppointmentRequest {
    pub physician_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub kind: AppointmentKind,
}

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentListing {
    pub upcoming: Vec<Appointment>,
    pub past: Vec<Appointment>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Debug, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment {0} not found")]
    NotFound(Uuid),

    #[error("The requested slot is no longer available")]
    SlotTaken,

    #[error("Requested time is not a bookable slot: {0}")]
    InvalidSlot(String),

    #[error("Cannot {action} an appointment that is {current}")]
    InvalidState {
        current: AppointmentStatus,
        action: &'static str,
    },

    #[error("Caller is not a participant of this appointment")]
    NotParticipant,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Directory(#[from] DoctorError),

    #[error(transparent)]
    Subscriptions(#[from] PatientError),

    #[error("Appointment store error: {0}")]
    Store(String),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound(_) => AppError::NotFound(err.to_string()),
            AppointmentError::SlotTaken | AppointmentError::InvalidState { .. } => {
                AppError::Conflict(err.to_string())
            }
            AppointmentError::InvalidSlot(_) | AppointmentError::Validation(_) => {
                AppError::ValidationError(err.to_string())
            }
            AppointmentError::NotParticipant => AppError::Forbidden(err.to_string()),
            AppointmentError::Directory(inner) => inner.into(),
            AppointmentError::Subscriptions(inner) => inner.into(),
            AppointmentError::Store(msg) => AppError::Database(msg),
        }
    }
}
