use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;
use shared_models::{Actor, ActorRole};

use super::{AppointmentStore, AppointmentUpdate, StoreError};
use crate::models::{Appointment, AppointmentStatus};

const TABLE: &str = "/rest/v1/appointments";

/// PostgREST-backed store. The `appointments` table carries an exclusion
/// constraint over `tstzrange(scheduled_at, ends_at)` for active statuses, so
/// a racing insert surfaces as HTTP 409.
pub struct SupabaseAppointmentStore {
    supabase: Arc<SupabaseClient>,
}

fn timestamp(at: DateTime<Utc>) -> String {
    urlencoding::encode(&at.to_rfc3339_opts(SecondsFormat::Millis, true)).into_owned()
}

fn status_list(statuses: &[AppointmentStatus]) -> String {
    statuses
        .iter()
        .map(AppointmentStatus::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl SupabaseAppointmentStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn select(&self, query: String) -> Result<Vec<Appointment>, StoreError> {
        let path = format!("{}?{}", TABLE, query);
        Ok(self.supabase.request(Method::GET, &path, None, None).await?)
    }
}

#[async_trait]
impl AppointmentStore for SupabaseAppointmentStore {
    async fn insert_if_free(&self, appointment: Appointment) -> Result<Appointment, StoreError> {
        let mut row = serde_json::to_value(&appointment)
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        row["ends_at"] = json!(appointment.ends_at());

        let mut inserted: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                None,
                Some(row),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        inserted
            .pop()
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))
    }

    async fn get(&self, id: Uuid) -> Result<Option<Appointment>, StoreError> {
        let mut rows = self.select(format!("id=eq.{}&limit=1", id)).await?;
        Ok(rows.pop())
    }

    async fn list_active_between(
        &self,
        physician_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        self.select(format!(
            "physician_id=eq.{}&status=in.({})&scheduled_at=lt.{}&ends_at=gt.{}&order=scheduled_at.asc",
            physician_id,
            status_list(&AppointmentStatus::ACTIVE),
            timestamp(to),
            timestamp(from)
        ))
        .await
    }

    async fn list_for_participant(&self, actor: &Actor) -> Result<Vec<Appointment>, StoreError> {
        let column = match actor.role {
            ActorRole::Physician => "physician_id",
            ActorRole::Patient => "patient_id",
            ActorRole::System => return Ok(Vec::new()),
        };
        self.select(format!("{}=eq.{}&order=scheduled_at.asc", column, actor.id))
            .await
    }

    async fn update_if(
        &self,
        id: Uuid,
        expected: &[AppointmentStatus],
        update: AppointmentUpdate,
        now: DateTime<Utc>,
    ) -> Result<Appointment, StoreError> {
        let mut body: Value =
            serde_json::to_value(&update).map_err(|e| StoreError::Backend(e.to_string()))?;
        body["updated_at"] = json!(now);

        let path = format!("{}?id=eq.{}&status=in.({})", TABLE, id, status_list(expected));
        let mut updated: Vec<Appointment> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await?;

        if let Some(appointment) = updated.pop() {
            return Ok(appointment);
        }

        // Nothing matched the filter: either the row is gone or its status moved on.
        match self.get(id).await? {
            Some(current) => {
                debug!(
                    "Guarded update of {} lost: status is {} (expected one of {})",
                    id,
                    current.status,
                    status_list(expected)
                );
                Err(StoreError::StateConflict(current.status))
            }
            None => Err(StoreError::NotFound(id)),
        }
    }

    async fn list_expired_holds(&self, now: DateTime<Utc>) -> Result<Vec<Appointment>, StoreError> {
        self.select(format!(
            "status=eq.reserved&hold_expires_at=lte.{}&order=hold_expires_at.asc",
            timestamp(now)
        ))
        .await
    }

    async fn list_unstarted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, StoreError> {
        let rows = self
            .select(format!(
                "status=eq.confirmed&started_at=is.null&scheduled_at=lt.{}",
                timestamp(cutoff)
            ))
            .await?;
        if !rows.is_empty() {
            warn!("{} confirmed appointments were never started", rows.len());
        }
        Ok(rows)
    }

    async fn list_present_in_progress(&self) -> Result<Vec<Appointment>, StoreError> {
        self.select(
            "status=eq.in_progress&or=(physician_present.is.true,patient_present.is.true)".to_string(),
        )
        .await
    }
}
