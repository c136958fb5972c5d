use serde::Serialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use doctor_cell::{Physician, PhysicianDirectory};
use patient_cell::{SubscriptionDirectory, SubscriptionPlan};
use shared_config::PaymentConfig;
use shared_utils::Clock;

use crate::models::{Appointment, AppointmentError, AppointmentKind};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PriceSource {
    SubscriptionPlan { plan_id: Uuid, plan_name: String },
    PhysicianPrice,
    PlatformDefault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Quote {
    pub amount_cents: i64,
    pub currency: String,
    pub kind: AppointmentKind,
    pub source: PriceSource,
}

/// Amount due for a consultation.
///
/// The base is the physician's own price, else the platform default. An
/// active plan replaces the base with its first-visit or follow-up price.
pub fn price_for(
    physician_price_cents: Option<i64>,
    platform_base_price_cents: i64,
    plan: Option<&SubscriptionPlan>,
    kind: AppointmentKind,
) -> (i64, PriceSource) {
    if let Some(plan) = plan {
        let amount = match kind {
            AppointmentKind::FirstVisit => plan.first_visit_price_cents,
            AppointmentKind::FollowUp => plan.follow_up_price_cents,
        };
        return (
            amount,
            PriceSource::SubscriptionPlan {
                plan_id: plan.id,
                plan_name: plan.name.clone(),
            },
        );
    }

    match physician_price_cents {
        Some(amount) => (amount, PriceSource::PhysicianPrice),
        None => (platform_base_price_cents, PriceSource::PlatformDefault),
    }
}

/// Looks up the inputs of [`price_for`]; it never persists anything.
pub struct PricingEngine {
    directory: Arc<dyn PhysicianDirectory>,
    subscriptions: Arc<dyn SubscriptionDirectory>,
    clock: Arc<dyn Clock>,
    platform_base_price_cents: i64,
    currency: String,
}

impl PricingEngine {
    pub fn new(
        directory: Arc<dyn PhysicianDirectory>,
        subscriptions: Arc<dyn SubscriptionDirectory>,
        clock: Arc<dyn Clock>,
        config: &PaymentConfig,
    ) -> Self {
        Self {
            directory,
            subscriptions,
            clock,
            platform_base_price_cents: config.platform_base_price_cents,
            currency: config.currency.clone(),
        }
    }

    pub async fn quote(
        &self,
        patient_id: Uuid,
        physician: &Physician,
        kind: AppointmentKind,
    ) -> Result<Quote, AppointmentError> {
        let plan = self
            .subscriptions
            .active_plan_for(patient_id, self.clock.now())
            .await?;

        let (amount_cents, source) = price_for(
            physician.consultation_price_cents,
            self.platform_base_price_cents,
            plan.as_ref(),
            kind,
        );
        debug!("Priced {:?} for patient {} at {} ({:?})", kind, patient_id, amount_cents, source);

        Ok(Quote {
            amount_cents,
            currency: self.currency.clone(),
            kind,
            source,
        })
    }

    pub async fn quote_for(&self, appointment: &Appointment) -> Result<Quote, AppointmentError> {
        let physician = self
            .directory
            .require_physician(appointment.physician_id)
            .await?;
        self.quote(appointment.patient_id, &physician, appointment.kind)
            .await
    }
}
