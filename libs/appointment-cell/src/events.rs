use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use shared_models::ActorRole;

/// Fire-and-forget notifications for downstream consumers (patient messaging,
/// the prescription workflow). Delivery and retries are the sink's concern.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    BookingConfirmed {
        appointment_id: Uuid,
        physician_id: Uuid,
        patient_id: Uuid,
        scheduled_at: DateTime<Utc>,
        charge_id: Uuid,
    },
    BookingCancelled {
        appointment_id: Uuid,
        physician_id: Uuid,
        patient_id: Uuid,
        cancelled_by: ActorRole,
    },
    SessionCompleted {
        appointment_id: Uuid,
        physician_id: Uuid,
        patient_id: Uuid,
        ended_at: DateTime<Utc>,
    },
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::BookingConfirmed { .. } => "booking_confirmed",
            DomainEvent::BookingCancelled { .. } => "booking_cancelled",
            DomainEvent::SessionCompleted { .. } => "session_completed",
        }
    }

    pub fn appointment_id(&self) -> Uuid {
        match self {
            DomainEvent::BookingConfirmed { appointment_id, .. }
            | DomainEvent::BookingCancelled { appointment_id, .. }
            | DomainEvent::SessionCompleted { appointment_id, .. } => *appointment_id,
        }
    }
}

#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn publish(&self, event: DomainEvent);
}

/// Default sink: structured log line per event.
pub struct TracingNotificationSink;

#[async_trait]
impl NotificationSink for TracingNotificationSink {
    async fn publish(&self, event: DomainEvent) {
        let payload = serde_json::to_string(&event).unwrap_or_default();
        info!(
            event = event.name(),
            appointment_id = %event.appointment_id(),
            "domain event: {}",
            payload
        );
    }
}

/// Forwards events into an unbounded channel, for integration consumers and tests.
pub struct ChannelNotificationSink {
    sender: mpsc::UnboundedSender<DomainEvent>,
}

impl ChannelNotificationSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<DomainEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl NotificationSink for ChannelNotificationSink {
    async fn publish(&self, event: DomainEvent) {
        if let Err(err) = self.sender.send(event) {
            warn!("Dropping {} event: receiver closed", err.0.name());
        }
    }
}
