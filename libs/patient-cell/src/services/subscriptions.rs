use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::SupabaseClient;

use crate::models::{PatientError, PatientSubscription, SubscriptionPlan};

/// Source of the active subscription plan of a patient, used for pricing.
#[async_trait]
pub trait SubscriptionDirectory: Send + Sync {
    async fn active_plan_for(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionPlan>, PatientError>;
}

#[derive(Default)]
pub struct InMemorySubscriptionDirectory {
    plans: RwLock<HashMap<Uuid, SubscriptionPlan>>,
    subscriptions: RwLock<HashMap<Uuid, PatientSubscription>>,
}

impl InMemorySubscriptionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_plan(&self, plan: SubscriptionPlan) {
        self.plans.write().await.insert(plan.id, plan);
    }

    /// One subscription per patient; a new one replaces the previous.
    pub async fn subscribe(&self, subscription: PatientSubscription) {
        self.subscriptions
            .write()
            .await
            .insert(subscription.patient_id, subscription);
    }
}

#[async_trait]
impl SubscriptionDirectory for InMemorySubscriptionDirectory {
    async fn active_plan_for(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionPlan>, PatientError> {
        let subscription = match self.subscriptions.read().await.get(&patient_id) {
            Some(s) if s.is_active_at(now) => s.clone(),
            _ => return Ok(None),
        };

        self.plans
            .read()
            .await
            .get(&subscription.plan_id)
            .cloned()
            .map(Some)
            .ok_or(PatientError::DanglingPlan(subscription.plan_id))
    }
}

pub struct SupabaseSubscriptionDirectory {
    supabase: Arc<SupabaseClient>,
}

impl SupabaseSubscriptionDirectory {
    pub fn new(supabase: Arc<SupabaseClient>) -> Self {
        Self { supabase }
    }
}

#[async_trait]
impl SubscriptionDirectory for SupabaseSubscriptionDirectory {
    async fn active_plan_for(
        &self,
        patient_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionPlan>, PatientError> {
        let path = format!(
            "/rest/v1/patient_subscriptions?patient_id=eq.{}&status=eq.active&order=valid_until.desc.nullsfirst",
            patient_id
        );
        let subscriptions: Vec<PatientSubscription> =
            self.supabase.request(Method::GET, &path, None, None).await?;

        let Some(active) = subscriptions.into_iter().find(|s| s.is_active_at(now)) else {
            debug!("Patient {} has no active subscription", patient_id);
            return Ok(None);
        };

        let plan_path = format!("/rest/v1/subscription_plans?id=eq.{}&limit=1", active.plan_id);
        let mut plans: Vec<SubscriptionPlan> =
            self.supabase.request(Method::GET, &plan_path, None, None).await?;

        match plans.pop() {
            Some(plan) => Ok(Some(plan)),
            None => {
                warn!("Subscription {} points at missing plan {}", active.id, active.plan_id);
                Err(PatientError::DanglingPlan(active.plan_id))
            }
        }
    }
}
