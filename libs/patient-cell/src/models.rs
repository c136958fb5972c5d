use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_database::SupabaseError;
use shared_models::AppError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubscriptionPlan {
    pub id: Uuid,
    pub name: String,
    pub first_visit_price_cents: i64,
    pub follow_up_price_cents: i64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PatientSubscription {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub plan_id: Uuid,
    pub status: SubscriptionStatus,
    pub valid_until: Option<DateTime<Utc>>,
}

impl PatientSubscription {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active
            && self.valid_until.map_or(true, |until| until > now)
    }
}

#[derive(Debug, Error)]
pub enum PatientError {
    #[error("Subscription directory error: {0}")]
    Repository(String),

    #[error("Plan {0} referenced by a subscription does not exist")]
    DanglingPlan(Uuid),
}

impl From<SupabaseError> for PatientError {
    fn from(err: SupabaseError) -> Self {
        PatientError::Repository(err.to_string())
    }
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        AppError::Database(err.to_string())
    }
}
