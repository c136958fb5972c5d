#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use appointment_cell::{
    BookingLedger, ChannelNotificationSink, DomainEvent, InMemoryAppointmentStore, PricingEngine,
};
use doctor_cell::{InMemoryPhysicianDirectory, NewAvailabilityRule, Physician, PhysicianDirectory};
use patient_cell::InMemorySubscriptionDirectory;
use shared_config::{PaymentConfig, SchedulingConfig};
use shared_utils::ManualClock;

pub struct Fixture {
    pub ledger: Arc<BookingLedger>,
    pub pricing: Arc<PricingEngine>,
    pub clock: Arc<ManualClock>,
    pub events: UnboundedReceiver<DomainEvent>,
    pub directory: Arc<InMemoryPhysicianDirectory>,
    pub subscriptions: Arc<InMemorySubscriptionDirectory>,
    pub physician: Physician,
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2026-03-03, a Tuesday.
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
}

/// Monday noon before the Tuesday under test.
pub fn monday_noon() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()
}

pub async fn fixture() -> Fixture {
    let clock = Arc::new(ManualClock::new(monday_noon()));
    let directory = Arc::new(InMemoryPhysicianDirectory::new());
    let subscriptions = Arc::new(InMemorySubscriptionDirectory::new());

    let physician = Physician {
        id: Uuid::new_v4(),
        display_name: "Dr. Terça".to_string(),
        consultation_duration_minutes: 30,
        buffer_minutes: 10,
        consultation_price_cents: None,
        accepts_new_patients: true,
    };
    directory.upsert_physician(physician.clone()).await;
    directory
        .replace_rules(
            physician.id,
            vec![NewAvailabilityRule {
                day_of_week: 2,
                start_time: t(9, 0),
                end_time: t(12, 0),
            }],
        )
        .await
        .unwrap();

    let (sink, events) = ChannelNotificationSink::new();
    let ledger = Arc::new(BookingLedger::new(
        Arc::new(InMemoryAppointmentStore::new()),
        directory.clone(),
        Arc::new(sink),
        clock.clone(),
        &SchedulingConfig::default(),
    ));
    let pricing = Arc::new(PricingEngine::new(
        directory.clone(),
        subscriptions.clone(),
        clock.clone(),
        &PaymentConfig::default(),
    ));

    Fixture {
        ledger,
        pricing,
        clock,
        events,
        directory,
        subscriptions,
        physician,
    }
}

pub fn drain(events: &mut UnboundedReceiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
