pub mod memory;
pub mod supabase;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::{Actor, ActorRole};

use crate::models::{Appointment, AppointmentError, AppointmentStatus};

pub use memory::InMemoryAppointmentStore;
pub use supabase::SupabaseAppointmentStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("appointment {0} not found")]
    NotFound(Uuid),

    #[error("interval overlaps an active appointment")]
    SlotTaken,

    /// The guarded transition lost: the record is no longer in an expected status.
    #[error("appointment is {0}")]
    StateConflict(AppointmentStatus),

    #[error("{0}")]
    Backend(String),
}

impl From<SupabaseError> for StoreError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::Conflict(_) => StoreError::SlotTaken,
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppointmentError::NotFound(id),
            StoreError::SlotTaken => AppointmentError::SlotTaken,
            StoreError::StateConflict(current) => AppointmentError::InvalidState {
                current,
                action: "update",
            },
            StoreError::Backend(msg) => AppointmentError::Store(msg),
        }
    }
}

/// Field changes applied by a guarded transition. `None` leaves a field as is.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AppointmentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<AppointmentStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub charge_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub physician_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient_present: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled_by: Option<ActorRole>,
}

impl AppointmentUpdate {
    #[cfg(test)]
    pub fn status(status: AppointmentStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    pub fn presence(role: ActorRole, present: bool) -> Self {
        let mut update = Self::default();
        match role {
            ActorRole::Physician => update.physician_present = Some(present),
            ActorRole::Patient => update.patient_present = Some(present),
            ActorRole::System => {}
        }
        update
    }

    pub fn apply(&self, appointment: &mut Appointment, now: DateTime<Utc>) {
        if let Some(status) = self.status {
            appointment.status = status;
        }
        if let Some(charge_id) = self.charge_id {
            appointment.charge_id = Some(charge_id);
        }
        if let Some(room_id) = &self.room_id {
            appointment.room_id = Some(room_id.clone());
        }
        if let Some(present) = self.physician_present {
            appointment.physician_present = present;
        }
        if let Some(present) = self.patient_present {
            appointment.patient_present = present;
        }
        if let Some(started_at) = self.started_at {
            appointment.started_at = Some(started_at);
        }
        if let Some(ended_at) = self.ended_at {
            appointment.ended_at = Some(ended_at);
        }
        if let Some(role) = self.cancelled_by {
            appointment.cancelled_by = Some(role);
        }
        appointment.updated_at = now;
    }
}

/// Authoritative appointment records.
///
/// Both write paths are atomic per physician calendar: `insert_if_free`
/// enforces the no-overlap invariant over active appointments and
/// `update_if` only applies when the current status is one of `expected`.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert_if_free(&self, appointment: Appointment) -> Result<Appointment, StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError>;

    /// Active appointments of a physician overlapping `[from, to)`.
    async fn list_active_between(
        &self,
        physician_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    async fn list_for_participant(&self, actor: &Actor) -> Result<Vec<Appointment>, StoreError>;

    async fn update_if(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        update: AppointmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError>;

    /// Reserved appointments whose hold expired at or before `now`.
    async fn list_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError>;

    /// Confirmed appointments scheduled before `cutoff` that never started.
    async fn list_unstarted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError>;

    /// In-progress appointments with at least one stored presence flag set.
    async fn list_present_in_progress(&self) -> Result<Vec<Appointment>, StoreError>;
}
