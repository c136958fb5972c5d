use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use appointment_cell::{AppointmentError, AppointmentStatus};
use shared_models::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Charge {
    pub id: Uuid,
    pub appointment_id: Uuid,
    /// Locked when the charge is created.
    pub amount_cents: i64,
    pub currency: String,
    pub external_id: String,
    pub payable_code: String,
    pub status: ChargeStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ChargeStatus {
    Pending,
    Approved,
    Failed,
    Expired,
}

impl ChargeStatus {
    /// Pending and approved charges block a new charge for the same appointment.
    pub fn is_active(&self) -> bool {
        matches!(self, ChargeStatus::Pending | ChargeStatus::Approved)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChargeStatus::Pending => "pending",
            ChargeStatus::Approved => "approved",
            ChargeStatus::Failed => "failed",
            ChargeStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ChargeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status as reported by the payment provider.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProviderChargeStatus {
    #[serde(alias = "PENDING")]
    Pending,
    #[serde(alias = "APPROVED", alias = "paid")]
    Approved,
    #[serde(alias = "FAILED", alias = "rejected")]
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProviderCharge {
    #[serde(alias = "id")]
    pub external_id: String,
    pub payable_code: String,
    pub expires_at: DateTime<Utc>,
}

/// What the patient needs to pay and how often to poll.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChargeTicket {
    pub charge_id: Uuid,
    pub appointment_id: Uuid,
    pub payable_code: String,
    pub amount_cents: i64,
    pub currency: String,
    pub expires_at: DateTime<Utc>,
    pub status: ChargeStatus,
    pub poll_interval_seconds: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ChargeStatusView {
    pub charge_id: Uuid,
    pub appointment_id: Uuid,
    pub status: ChargeStatus,
    pub appointment_status: Option<AppointmentStatus>,
    pub expires_at: DateTime<Utc>,
    pub poll_interval_seconds: u64,
    /// Approved money for a booking that can no longer be honoured.
    pub refund_required: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookNotification {
    #[serde(alias = "id", alias = "charge_id")]
    pub external_id: String,
}

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("Charge {0} not found")]
    ChargeNotFound(Uuid),

    #[error("Appointment is already confirmed")]
    AlreadyConfirmed,

    #[error("The reservation hold has expired")]
    PaymentExpired,

    #[error("Cannot charge an appointment that is {0}")]
    NotPayable(AppointmentStatus),

    #[error("Only the appointment's patient can pay for it")]
    NotPatient,

    #[error("Payment provider error: {0}")]
    Provider(String),

    #[error("Charge store error: {0}")]
    Store(String),

    #[error(transparent)]
    Appointment(#[from] AppointmentError),
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::ChargeNotFound(_) => AppError::NotFound(err.to_string()),
            PaymentError::AlreadyConfirmed | PaymentError::NotPayable(_) => {
                AppError::Conflict(err.to_string())
            }
            PaymentError::PaymentExpired => AppError::Gone(err.to_string()),
            PaymentError::NotPatient => AppError::Forbidden(err.to_string()),
            PaymentError::Provider(msg) => AppError::ExternalService(msg),
            PaymentError::Store(msg) => AppError::Database(msg),
            PaymentError::Appointment(inner) => inner.into(),
        }
    }
}
