#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use tokio::sync::mpsc::UnboundedReceiver;
use uuid::Uuid;

use appointment_cell::{
    AppointmentKind, BookingLedger, ChannelNotificationSink, DomainEvent, InMemoryAppointmentStore,
};
use doctor_cell::{InMemoryPhysicianDirectory, NewAvailabilityRule, Physician, PhysicianDirectory};
use shared_config::SchedulingConfig;
use shared_models::Actor;
use shared_utils::ManualClock;
use video_conferencing_cell::{LocalRoomProvider, RoomProvider, SessionController};

pub struct Fixture {
    pub controller: Arc<SessionController>,
    pub ledger: Arc<BookingLedger>,
    pub clock: Arc<ManualClock>,
    pub events: UnboundedReceiver<DomainEvent>,
    pub physician: Actor,
    pub patient: Actor,
    /// Confirmed for Tuesday 09:00 UTC.
    pub appointment_id: Uuid,
}

pub fn t(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

/// 2026-03-03, a Tuesday.
pub fn tuesday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, 3, 3).unwrap()
}

pub fn tuesday_at(h: u32, m: u32) -> DateTime<Utc> {
    tuesday().and_time(t(h, m)).and_utc()
}

pub async fn fixture() -> Fixture {
    fixture_with(Arc::new(LocalRoomProvider), &SchedulingConfig::default()).await
}

pub async fn fixture_with(rooms: Arc<dyn RoomProvider>, config: &SchedulingConfig) -> Fixture {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()));
    let directory = Arc::new(InMemoryPhysicianDirectory::new());
    let physician = Physician {
        id: Uuid::new_v4(),
        display_name: "Dra. Vídeo".to_string(),
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
        directory,
        Arc::new(sink),
        clock.clone(),
        config,
    ));
    let controller = Arc::new(SessionController::new(ledger.clone(), rooms, config));

    let patient = Actor::patient(Uuid::new_v4());
    let appointment_id = book_confirmed(&ledger, physician.id, &patient, t(9, 0)).await;

    let mut fixture = Fixture {
        controller,
        ledger,
        clock,
        events,
        physician: Actor::physician(physician.id),
        patient,
        appointment_id,
    };
    drain(&mut fixture.events);
    fixture
}

pub async fn book_confirmed(
    ledger: &BookingLedger,
    physician_id: Uuid,
    patient: &Actor,
    time: NaiveTime,
) -> Uuid {
    let reserved = ledger
        .reserve(physician_id, patient, tuesday(), time, AppointmentKind::FirstVisit)
        .await
        .unwrap();
    ledger.confirm(reserved.id, Uuid::new_v4()).await.unwrap();
    reserved.id
}

pub fn drain(events: &mut UnboundedReceiver<DomainEvent>) -> Vec<DomainEvent> {
    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    seen
}
