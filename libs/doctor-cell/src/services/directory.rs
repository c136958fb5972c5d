use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use crate::models::{AvailabilityRule, DoctorError, NewAvailabilityRule, Physician};
use crate::services::availability::validate_rules;

/// Read side of the physician profile plus the weekly availability rules.
/// Profile CRUD lives elsewhere; scheduling only needs these lookups.
#[async_trait]
pub trait PhysicianDirectory: Send + Sync {
    async fn physician(&self, physician_id: Uuid) -> Result<Option<Physician>, DoctorError>;

    async fn rules(&self, physician_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError>;

    async fn rules_for_day(
        &self,
        physician_id: Uuid,
        day_of_week: u8,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        let mut rules = self.rules(physician_id).await?;
        rules.retain(|r| r.day_of_week == day_of_week);
        Ok(rules)
    }

    /// Replace every rule of a physician in one step.
    async fn replace_rules(
        &self,
        physician_id: Uuid,
        rules: Vec<NewAvailabilityRule>,
    ) -> Result<Vec<AvailabilityRule>, DoctorError>;

    async fn require_physician(&self, physician_id: Uuid) -> Result<Physician, DoctorError> {
        self.physician(physician_id)
            .await?
            .ok_or(DoctorError::PhysicianNotFound(physician_id))
    }
}

#[derive(Default)]
pub struct InMemoryPhysicianDirectory {
    physicians: RwLock<HashMap<Uuid, Physician>>,
    rules: RwLock<HashMap<Uuid, Vec<AvailabilityRule>>>,
}

impl InMemoryPhysicianDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn upsert_physician(&self, physician: Physician) {
        debug!("Registering physician {}", physician.id);
        self.physicians.write().await.insert(physician.id, physician);
    }
}

#[async_trait]
impl PhysicianDirectory for InMemoryPhysicianDirectory {
    async fn physician(&self, physician_id: Uuid) -> Result<Option<Physician>, DoctorError> {
        Ok(self.physicians.read().await.get(&physician_id).cloned())
    }

    async fn rules(&self, physician_id: Uuid) -> Result<Vec<AvailabilityRule>, DoctorError> {
        Ok(self
            .rules
            .read()
            .await
            .get(&physician_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn replace_rules(
        &self,
        physician_id: Uuid,
        rules: Vec<NewAvailabilityRule>,
    ) -> Result<Vec<AvailabilityRule>, DoctorError> {
        self.require_physician(physician_id).await?;
        let validated = validate_rules(physician_id, rules)?;
        self.rules.write().await.insert(physician_id, validated.clone());
        Ok(validated)
    }
}
