use async_trait::async_trait;
use chrono::Duration;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use shared_config::PaymentConfig;
use shared_utils::Clock;

use crate::models::{PaymentError, ProviderCharge, ProviderChargeStatus};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Provider returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Unexpected provider response: {0}")]
    Decode(String),

    #[error("Unknown charge {0}")]
    UnknownCharge(String),
}

impl From<ProviderError> for PaymentError {
    fn from(err: ProviderError) -> Self {
        PaymentError::Provider(err.to_string())
    }
}

/// External payment processor. Amounts are integer cents.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        payer_reference: &str,
    ) -> Result<ProviderCharge, ProviderError>;

    async fn get_charge_status(&self, external_id: &str) -> Result<ProviderChargeStatus, ProviderError>;
}

#[derive(Serialize)]
struct CreateChargeBody<'a> {
    amount_cents: i64,
    currency: &'a str,
    payer_reference: &'a str,
}

/// REST payment provider authenticated with a bearer token.
/// POST {base}/charges, GET {base}/charges/{id}
pub struct HttpPaymentProvider {
    client: Client,
    base_url: String,
    api_token: String,
}

impl HttpPaymentProvider {
    pub fn new(config: &PaymentConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.provider_base_url.trim_end_matches('/').to_string(),
            api_token: config.provider_api_token.clone(),
        }
    }

    async fn read_json(response: reqwest::Response) -> Result<Value, ProviderError> {
        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            error!("Payment provider error: {} - {}", status, text);
            return Err(ProviderError::Api {
                status: status.as_u16(),
                message: text,
            });
        }
        serde_json::from_str(&text).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

#[async_trait]
impl PaymentProvider for HttpPaymentProvider {
    async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        payer_reference: &str,
    ) -> Result<ProviderCharge, ProviderError> {
        let url = format!("{}/charges", self.base_url);
        debug!("Creating provider charge of {} {} at {}", amount_cents, currency, url);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&CreateChargeBody {
                amount_cents,
                currency,
                payer_reference,
            })
            .send()
            .await?;

        let body = Self::read_json(response).await?;
        let charge: ProviderCharge =
            serde_json::from_value(body).map_err(|e| ProviderError::Decode(e.to_string()))?;

        info!("Provider charge {} created", charge.external_id);
        Ok(charge)
    }

    async fn get_charge_status(&self, external_id: &str) -> Result<ProviderChargeStatus, ProviderError> {
        let url = format!("{}/charges/{}", self.base_url, external_id);
        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_token)
            .send()
            .await?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ProviderError::UnknownCharge(external_id.to_string()));
        }

        let body = Self::read_json(response).await?;
        let status = body
            .get("status")
            .cloned()
            .ok_or_else(|| ProviderError::Decode("missing status".to_string()))?;
        serde_json::from_value(status).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

/// In-process provider for development and tests. Charges stay pending
/// until approved or failed, unless `auto_approve` is set.
pub struct SandboxPaymentProvider {
    charges: Mutex<HashMap<String, ProviderChargeStatus>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
    auto_approve: bool,
}

impl SandboxPaymentProvider {
    pub fn new(clock: Arc<dyn Clock>, config: &PaymentConfig) -> Self {
        Self {
            charges: Mutex::new(HashMap::new()),
            clock,
            ttl: Duration::minutes(config.charge_ttl_minutes.max(1)),
            auto_approve: config.sandbox_auto_approve,
        }
    }

    fn set(&self, external_id: &str, status: ProviderChargeStatus) -> Result<(), ProviderError> {
        let mut charges = self.charges.lock().unwrap_or_else(|e| e.into_inner());
        match charges.get_mut(external_id) {
            Some(current) => {
                *current = status;
                Ok(())
            }
            None => Err(ProviderError::UnknownCharge(external_id.to_string())),
        }
    }

    pub fn approve(&self, external_id: &str) -> Result<(), ProviderError> {
        self.set(external_id, ProviderChargeStatus::Approved)
    }

    pub fn fail(&self, external_id: &str) -> Result<(), ProviderError> {
        self.set(external_id, ProviderChargeStatus::Failed)
    }
}

#[async_trait]
impl PaymentProvider for SandboxPaymentProvider {
    async fn create_charge(
        &self,
        amount_cents: i64,
        currency: &str,
        payer_reference: &str,
    ) -> Result<ProviderCharge, ProviderError> {
        let external_id = format!("sbx_{}", Uuid::new_v4().simple());
        self.charges
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(external_id.clone(), ProviderChargeStatus::Pending);

        debug!(
            "Sandbox charge {} for {} {} (payer {})",
            external_id, amount_cents, currency, payer_reference
        );

        Ok(ProviderCharge {
            payable_code: format!("SANDBOX-{}-{}", currency, &external_id[4..12]),
            external_id,
            expires_at: self.clock.now() + self.ttl,
        })
    }

    async fn get_charge_status(&self, external_id: &str) -> Result<ProviderChargeStatus, ProviderError> {
        let mut charges = self.charges.lock().unwrap_or_else(|e| e.into_inner());
        let status = charges
            .get_mut(external_id)
            .ok_or_else(|| ProviderError::UnknownCharge(external_id.to_string()))?;
        if self.auto_approve && *status == ProviderChargeStatus::Pending {
            *status = ProviderChargeStatus::Approved;
        }
        Ok(*status)
    }
}
