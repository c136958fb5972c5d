use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use shared_database::{SupabaseClient, SupabaseError};

use crate::models::{Charge, ChargeStatus, PaymentError};

#[derive(Debug, Error)]
pub enum ChargeStoreError {
    #[error("charge {0} not found")]
    NotFound(Uuid),

    #[error("appointment {0} already has an active charge")]
    ActiveChargeExists(Uuid),

    #[error("charge is {0}")]
    StateConflict(ChargeStatus),

    #[error("{0}")]
    Backend(String),
}

impl From<ChargeStoreError> for PaymentError {
    fn from(err: ChargeStoreError) -> Self {
        match err {
            ChargeStoreError::NotFound(id) => PaymentError::ChargeNotFound(id),
            other => PaymentError::Store(other.to_string()),
        }
    }
}

/// Charges, at most one pending or approved per appointment.
#[async_trait]
pub trait ChargeStore: Send + Sync {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeStoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Charge>, ChargeStoreError>;

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Charge>, ChargeStoreError>;

    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Charge>, ChargeStoreError>;

    /// Status change guarded on the current status.
    async fn update_status_if(
        &self,
        id: Uuid,
        expected: ChargeStatus,
        status: ChargeStatus,
        now: DateTime<Utc>,
    ) -> Result<Charge, ChargeStoreError>;
}

#[derive(Default)]
pub struct InMemoryChargeStore {
    charges: RwLock<HashMap<Uuid, Charge>>,
}

impl InMemoryChargeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChargeStore for InMemoryChargeStore {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeStoreError> {
        let mut charges = self.charges.write().await;
        if charges
            .values()
            .any(|c| c.appointment_id == charge.appointment_id && c.status.is_active())
        {
            return Err(ChargeStoreError::ActiveChargeExists(charge.appointment_id));
        }
        charges.insert(charge.id, charge.clone());
        Ok(charge)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Charge>, ChargeStoreError> {
        Ok(self.charges.read().await.get(&id).cloned())
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Charge>, ChargeStoreError> {
        Ok(self
            .charges
            .read()
            .await
            .values()
            .find(|c| c.external_id == external_id)
            .cloned())
    }

    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Charge>, ChargeStoreError> {
        Ok(self
            .charges
            .read()
            .await
            .values()
            .filter(|c| c.appointment_id == appointment_id)
            .max_by_key(|c| c.created_at)
            .cloned())
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: ChargeStatus,
        status: ChargeStatus,
        now: DateTime<Utc>,
    ) -> Result<Charge, ChargeStoreError> {
        let mut charges = self.charges.write().await;
        let charge = charges.get_mut(&id).ok_or(ChargeStoreError::NotFound(id))?;
        if charge.status != expected {
            return Err(ChargeStoreError::StateConflict(charge.status));
        }
        charge.status = status;
        charge.updated_at = now;
        Ok(charge.clone())
    }
}

const TABLE: &str = "/rest/v1/charges";

/// `charges` table with a partial unique index on `appointment_id` for
/// pending/approved rows.
pub struct SupabaseChargeStore {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseChargeStore {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }

    async fn first(&self, query: String) -> Result<Option<Charge>, ChargeStoreError> {
        let path = format!("{}?{}", TABLE, query);
        let mut rows: Vec<Charge> = self
            .supabase
            .request(Method::GET, &path, None, None)
            .await
            .map_err(|e| ChargeStoreError::Backend(e.to_string()))?;
        Ok(rows.pop())
    }
}

#[async_trait]
impl ChargeStore for SupabaseChargeStore {
    async fn insert(&self, charge: Charge) -> Result<Charge, ChargeStoreError> {
        let body = serde_json::to_value(&charge).map_err(|e| ChargeStoreError::Backend(e.to_string()))?;
        let result: Result<Vec<Charge>, SupabaseError> = self
            .supabase
            .request_with_headers(
                Method::POST,
                TABLE,
                None,
                Some(body),
                Some(SupabaseClient::return_representation()),
            )
            .await;

        match result {
            Ok(mut rows) => rows
                .pop()
                .ok_or_else(|| ChargeStoreError::Backend("insert returned no row".to_string())),
            Err(err) if err.is_conflict() => {
                Err(ChargeStoreError::ActiveChargeExists(charge.appointment_id))
            }
            Err(err) => Err(ChargeStoreError::Backend(err.to_string())),
        }
    }

    async fn get(&self, id: Uuid) -> Result<Option<Charge>, ChargeStoreError> {
        self.first(format!("id=eq.{}&limit=1", id)).await
    }

    async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Charge>, ChargeStoreError> {
        self.first(format!(
            "external_id=eq.{}&limit=1",
            urlencoding::encode(external_id)
        ))
        .await
    }

    async fn latest_for_appointment(&self, appointment_id: Uuid) -> Result<Option<Charge>, ChargeStoreError> {
        self.first(format!(
            "appointment_id=eq.{}&order=created_at.desc&limit=1",
            appointment_id
        ))
        .await
    }

    async fn update_status_if(
        &self,
        id: Uuid,
        expected: ChargeStatus,
        status: ChargeStatus,
        now: DateTime<Utc>,
    ) -> Result<Charge, ChargeStoreError> {
        let path = format!("{}?id=eq.{}&status=eq.{}", TABLE, id, expected);
        let mut rows: Vec<Charge> = self
            .supabase
            .request_with_headers(
                Method::PATCH,
                &path,
                None,
                Some(json!({ "status": status, "updated_at": now })),
                Some(SupabaseClient::return_representation()),
            )
            .await
            .map_err(|e| ChargeStoreError::Backend(e.to_string()))?;

        if let Some(updated) = rows.pop() {
            return Ok(updated);
        }
        match self.get(id).await? {
            Some(current) => Err(ChargeStoreError::StateConflict(current.status)),
            None => Err(ChargeStoreError::NotFound(id)),
        }
    }
}
