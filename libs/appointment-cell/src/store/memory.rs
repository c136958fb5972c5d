use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use shared_models::{Actor, ActorRole};

use super::{AppointmentStore, AppointmentUpdate, StoreError};
use crate::models::{Appointment, AppointmentStatus};

type Calendar = Arc<Mutex<HashMap<Uuid, Appointment>>>;

/// Process-local store with one lock per physician calendar.
///
/// Lock order is calendar first, then the appointment index; the index lock is
/// never held while waiting for a calendar.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    calendars: RwLock<HashMap<Uuid, Calendar>>,
    index: RwLock<HashMap<Uuid, Uuid>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn calendar(&self, physician_id: Uuid) -> Calendar {
        if let Some(calendar) = self.calendars.read().await.get(&physician_id) {
            return calendar.clone();
        }
        self.calendars
            .write()
            .await
            .entry(physician_id)
            .or_default()
            .clone()
    }

    async fn calendar_of(&self, appointment_id: Uuid) -> Option<Calendar> {
        let physician_id = *self.index.read().await.get(&appointment_id)?;
        Some(self.calendar(physician_id).await)
    }

    async fn all_calendars(&self) -> Vec<Calendar> {
        self.calendars.read().await.values().cloned().collect()
    }

    async fn collect<F>(&self, mut keep: F) -> Vec<Appointment>
    where
        F: FnMut(&Appointment) -> bool + Send,
    {
        let mut found = Vec::new();
        for calendar in self.all_calendars().await {
            let calendar = calendar.lock().await;
            found.extend(calendar.values().filter(|a| keep(a)).cloned());
        }
        found.sort_by_key(|a| a.scheduled_at);
        found
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert_if_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let calendar = self.calendar(appointment.physician_id).await;
        let mut calendar = calendar.lock().await;

        if calendar
            .values()
            .any(|existing| existing.status.is_active() && existing.overlaps(&appointment))
        {
            debug!(
                "Rejecting appointment at {} for physician {}: slot taken",
                appointment.scheduled_at, appointment.physician_id
            );
            return Err(StoreError::SlotTaken);
        }

        calendar.insert(appointment.id, appointment.clone());
        self.index
            .write()
            .await
            .insert(appointment.id, appointment.physician_id);

        Ok(appointment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let Some(calendar) = self.calendar_of(id).await else {
            return Ok(None);
        };
        let calendar = calendar.lock().await;
        Ok(calendar.get(&id).cloned())
    }

    async fn list_active_between(
        &self,
        physician_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let calendar = self.calendar(physician_id).await;
        let calendar = calendar.lock().await;
        let mut found: Vec<Appointment> = calendar
            .values()
            .filter(|a| a.status.is_active() && a.scheduled_at < to && a.ends_at() > from)
            .cloned()
            .collect();
        found.sort_by_key(|a| a.scheduled_at);
        Ok(found)
    }

    async fn list_for_participant(&self, actor: &Actor) -> Result<Vec<Appointment>, StoreError> {
        match actor.role {
            ActorRole::Physician => {
                let calendar = self.calendar(actor.id).await;
                let calendar = calendar.lock().await;
                let mut found: Vec<Appointment> = calendar.values().cloned().collect();
                found.sort_by_key(|a| a.scheduled_at);
                Ok(found)
            }
            ActorRole::Patient => {
                let patient_id = actor.id;
                Ok(self.collect(|a| a.patient_id == patient_id).await)
            }
            ActorRole::System => Ok(Vec::new()),
        }
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        update: AppointmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let calendar = self.calendar_of(id).await.ok_or(StoreError::NotFound(id))?;
        let mut calendar = calendar.lock().await;
        let appointment = calendar.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        if !expected.contains(&appointment.status) {
            return Err(StoreError::StateConflict(appointment.status));
        }

        update.apply(appointment, now);
        Ok(appointment.clone())
    }

    async fn list_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError> {
        Ok(self.collect(|a| a.hold_lapsed(now)).await)
    }

    async fn list_unstarted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .collect(|a| a.status == AppointmentStatus::Confirmed && a.scheduled_at < cutoff)
            .await)
    }

    async fn list_present_in_progress(&self) -> Result<Vec<Appointment>, StoreError> {
        Ok(self
            .collect(|a| {
                a.status == AppointmentStatus::InProgress && (a.physician_present || a.patient_present)
            })
            .await)
    }
}
