use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, NaiveTime, Utc};

use shared_database::SupabaseError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Physician {
    pub id: Uuid,
    pub display_name: String,
    pub consultation_duration_minutes: i64,
    pub buffer_minutes: i64,
    /// `None` falls back to the platform base price.
    pub consultation_price_cents: Option<i64>,
    pub accepts_new_patients: bool,
}

impl Physician {
    /// Distance between consecutive slot starts.
    pub fn slot_step_minutes(&self) -> i64 {
        self.consultation_duration_minutes + self.buffer_minutes.max(0)
    }
}

/// Recurring weekly window in physician-local clock time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AvailabilityRule {
    pub id: Uuid,
    pub physician_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AvailabilityRule {
    pub fn overlaps(&self, other: &AvailabilityRule) -> bool {
        self.day_of_week == other.day_of_week
            && self.start_time < other.end_time
            && other.start_time < self.end_time
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAvailabilityRule {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaceAvailabilityRequest {
    pub rules: Vec<NewAvailabilityRule>,
}

/// A candidate slot. Slots overlapping an active booking stay in the list
/// with `available: false` so clients can render them disabled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slot {
    pub time: NaiveTime,
    pub end_time: NaiveTime,
    pub starts_at: DateTime<Utc>,
    pub available: bool,
}

/// Time already held by a RESERVED, CONFIRMED or IN_PROGRESS appointment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BookedInterval {
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl BookedInterval {
    pub fn overlaps(&self, starts_at: DateTime<Utc>, ends_at: DateTime<Utc>) -> bool {
        starts_at < self.ends_at && self.starts_at < ends_at
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DoctorError {
    #[error("Physician {0} not found")]
    PhysicianNotFound(Uuid),

    #[error("Physician {0} is not accepting new patients")]
    NotAcceptingPatients(Uuid),

    #[error("Invalid availability rule: {0}")]
    InvalidRule(String),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Directory error: {0}")]
    Repository(String),
}

impl From<SupabaseError> for DoctorError {
    fn from(err: SupabaseError) -> Self {
        DoctorError::Repository(err.to_string())
    }
}

impl From<DoctorError> for shared_models::AppError {
    fn from(err: DoctorError) -> Self {
        use shared_models::AppError;
        match err {
            DoctorError::PhysicianNotFound(_) | DoctorError::NotAcceptingPatients(_) => {
                AppError::NotFound(err.to_string())
            }
            DoctorError::InvalidRule(msg) | DoctorError::InvalidDate(msg) => AppError::ValidationError(msg),
            DoctorError::Repository(msg) => AppError::Database(msg),
        }
    }
}
