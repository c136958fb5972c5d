#![allow(dead_code)]

use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use appointment_cell::{
    Appointment, AppointmentKind, BookingLedger, ChannelNotificationSink, DomainEvent,
    InMemoryAppointmentStore, PricingEngine,
};
use doctor_cell::{InMemoryPhysicianDirectory, NewAvailabilityRule, Physician, PhysicianDirectory};
use patient_cell::{InMemorySubscriptionDirectory, PatientSubscription, SubscriptionPlan, SubscriptionStatus};
use payment_cell::{InMemoryChargeStore, PaymentGate, SandboxPaymentProvider};
use shared_config::{PaymentConfig, SchedulingConfig};
use shared_models::Actor;
use shared_utils::ManualClock;

pub struct Fixture {
    pub gate: Arc<PaymentGate>,
    pub ledger: Arc<BookingLedger>,
    pub sandbox: Arc<SandboxPaymentProvider>,
    pub charges: Arc<InMemoryChargeStore>,
    pub subscriptions: Arc<InMemorySubscriptionDirectory>,
    pub clock: Arc<ManualClock>,
    pub events: UnboundedReceiver<DomainEvent>,
    pub physician: Physician,
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2026-03-03, a Tuesday.
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
}

pub async fn fixture() -> Fixture {
    // Monday noon, the day before the bookable Tuesday.
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()));
    let directory = Arc::new(InMemoryPhysicianDirectory::new());
    let subscriptions = Arc::new(InMemorySubscriptionDirectory::new());

    let physician = Physician {
        id: Uuid::new_v4(),
        display_name: "Dr. Pix".to_string(),
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
    let payments = PaymentConfig {
        sandbox_auto_approve: false,
        ..PaymentConfig::default()
    };
    let pricing = Arc::new(PricingEngine::new(
        directory,
        subscriptions.clone(),
        clock.clone(),
        &payments,
    ));
    let sandbox = Arc::new(SandboxPaymentProvider::new(clock.clone(), &payments));
    let charges = Arc::new(InMemoryChargeStore::new());
    let gate = Arc::new(PaymentGate::new(
        ledger.clone(),
        pricing,
        sandbox.clone(),
        charges.clone(),
        payments.poll_interval_seconds,
    ));

    Fixture {
        gate,
        ledger,
        sandbox,
        charges,
        subscriptions,
        clock,
        events,
        physician,
    }
}

impl Fixture {
    pub async fn reserve(&self, patient: &Actor, time: NaiveTime) -> Appointment {
        self.ledger
            .reserve(self.physician.id, patient, tuesday(), time, AppointmentKind::FirstVisit)
            .await
            .unwrap()
    }

    pub async fn subscribe(&self, patient_id: Uuid, first_visit_price_cents: i64) -> SubscriptionPlan {
        let plan = SubscriptionPlan {
            id: Uuid::new_v4(),
            name: "Amae Mensal".to_string(),
            first_visit_price_cents,
            follow_up_price_cents: first_visit_price_cents / 2,
        };
        self.subscriptions.add_plan(plan.clone()).await;
        self.set_subscription(patient_id, plan.id, SubscriptionStatus::Active).await;
        plan
    }

    pub async fn set_subscription(&self, patient_id: Uuid, plan_id: Uuid, status: SubscriptionStatus) {
        self.subscriptions
            .subscribe(PatientSubscription {
                id: Uuid::new_v4(),
                patient_id,
                plan_id,
                status,
                valid_until: None,
            })
            .await;
    }
}

pub fn drain(events: &mut UnboundedReceiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
