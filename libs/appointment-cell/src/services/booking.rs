// libs/appointment-cell/src/services/booking.rs
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use doctor_cell::{AvailabilityResolver, BookedInterval, Physician, PhysicianDirectory, Slot};
use shared_config::SchedulingConfig;
use shared_models::{Actor, ActorRole};
use shared_utils::Clock;

use crate::events::{DomainEvent, NotificationSink};
use crate::models::{
    Appointment, AppointmentError, AppointmentKind, AppointmentListing, AppointmentStatus,
};
use crate::services::lifecycle::Transition;
use crate::store::{AppointmentStore, AppointmentUpdate, StoreError};

/// Authoritative lifecycle of appointments.
///
/// All writes go through the store's guarded operations, so request
/// handlers, the payment gate, the session controller and the sweeps can
/// race freely; whichever transition commits first wins.
pub struct BookingLedger {
    store: Arc<dyn AppointmentStore>,
    directory: Arc<dyn PhysicianDirectory>,
    resolver: AvailabilityResolver,
    notifier: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    hold: Duration,
}

impl BookingLedger {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        directory: Arc<dyn PhysicianDirectory>,
        notifier: Arc<dyn NotificationSink>,
        clock: Arc<dyn Clock>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            store,
            directory,
            resolver: AvailabilityResolver::new(config),
            notifier,
            clock,
            hold: Duration::minutes(config.hold_minutes.max(1)),
        }
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    async fn booked_on(
        &self,
        physician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<BookedInterval>, AppointmentError> {
        let day_start = self.resolver.local_instant(date, NaiveTime::MIN);
        let day_end = day_start + Duration::days(1);
        let booked = self
            .store
            .list_active_between(physician_id, day_start, day_end)
            .await?;
        Ok(booked.iter().map(Appointment::interval).collect())
    }

    async fn slots_for(
        &self,
        physician: &Physician,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let rules = self
            .directory
            .rules_for_day(physician.id, doctor_cell::day_of_week(date))
            .await?;
        let booked = self.booked_on(physician.id, date).await?;
        Ok(self
            .resolver
            .compute_slots(physician, &rules, date, &booked, self.now())?)
    }

    /// Candidate slots of a physician on a date, taken ones flagged unavailable.
    pub async fn available_slots(
        &self,
        physician_id: Uuid,
        date: NaiveDate,
    ) -> Result<Vec<Slot>, AppointmentError> {
        let physician = self.directory.require_physician(physician_id).await?;
        self.slots_for(&physician, date).await
    }

    /// Hold a slot for a patient until payment or hold expiry.
    #[instrument(skip(self, actor), fields(patient_id = %actor.id))]
    pub async fn reserve(
        &self,
        physician_id: Uuid,
        actor: &Actor,
        date: NaiveDate,
        time: NaiveTime,
        kind: AppointmentKind,
    ) -> Result<Appointment, AppointmentError> {
        if actor.role != ActorRole::Patient {
            return Err(AppointmentError::Validation(
                "Only patients can reserve appointments".to_string(),
            ));
        }

        let physician = self.directory.require_physician(physician_id).await?;

        // The listing the client saw is advisory; re-check against current state.
        let slots = self.slots_for(&physician, date).await?;
        let slot = slots.iter().find(|s| s.time == time).ok_or_else(|| {
            AppointmentError::InvalidSlot(format!("{} {} is not offered by this physician", date, time))
        })?;
        if !slot.available {
            return Err(AppointmentError::SlotTaken);
        }

        let now = self.now();
        let appointment = Appointment {
            id: Uuid::new_v4(),
            physician_id,
            patient_id: actor.id,
            scheduled_at: slot.starts_at,
            duration_minutes: physician.consultation_duration_minutes,
            kind,
            status: AppointmentStatus::Reserved,
            room_id: None,
            physician_present: false,
            patient_present: false,
            charge_id: None,
            hold_expires_at: Some(now + self.hold),
            started_at: None,
            ended_at: None,
            cancelled_by: None,
            created_at: now,
            updated_at: now,
        };

        // Atomic with respect to concurrent reservations of the same calendar.
        let reserved = self.store.insert_if_free(appointment).await?;

        info!(
            "Reserved appointment {} with physician {} at {} (hold until {:?})",
            reserved.id, physician_id, reserved.scheduled_at, reserved.hold_expires_at
        );
        Ok(reserved)
    }

    async fn transition(
        &self,
        id: Uuid,
        transition: Transition,
        mut update: AppointmentUpdate,
    ) -> Result<Appointment, AppointmentError> {
        update.status = Some(transition.target());
        self.store
            .update_if(id, transition.sources(), update, self.now())
            .await
            .map_err(|err| match err {
                StoreError::StateConflict(current) => AppointmentError::InvalidState {
                    current,
                    action: transition.verb(),
                },
                other => other.into(),
            })
    }

    /// RESERVED -> CONFIRMED once the given charge is approved. Repeating the
    /// call with the same charge is a no-op success, also after the session
    /// has started or finished.
    pub async fn confirm(
        &self,
        appointment_id: Uuid,
        charge_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;
        if current.is_settled_by(charge_id) {
            debug!(
                "Appointment {} already settled by charge {} (now {})",
                appointment_id, charge_id, current.status
            );
            return Ok(current);
        }

        let update = AppointmentUpdate {
            charge_id: Some(charge_id),
            ..AppointmentUpdate::default()
        };

        let confirmed = match self.transition(appointment_id, Transition::Confirm, update).await {
            Ok(confirmed) => confirmed,
            Err(AppointmentError::InvalidState { current, action }) => {
                // A concurrent duplicate delivery may have won the write.
                let latest = self.get(appointment_id).await?;
                if latest.is_settled_by(charge_id) {
                    return Ok(latest);
                }
                return Err(AppointmentError::InvalidState { current, action });
            }
            Err(err) => return Err(err),
        };

        info!("Appointment {} confirmed by charge {}", appointment_id, charge_id);
        self.notifier
            .publish(DomainEvent::BookingConfirmed {
                appointment_id,
                physician_id: confirmed.physician_id,
                patient_id: confirmed.patient_id,
                scheduled_at: confirmed.scheduled_at,
                charge_id,
            })
            .await;

        Ok(confirmed)
    }

    /// Cancel a RESERVED or CONFIRMED appointment on behalf of a participant
    /// or the system.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.get(appointment_id).await?;
        if !actor.is_system() && !current.is_participant(actor) {
            return Err(AppointmentError::NotParticipant);
        }

        let update = AppointmentUpdate {
            cancelled_by: Some(actor.role),
            ..AppointmentUpdate::default()
        };
        let cancelled = self.transition(appointment_id, Transition::Cancel, update).await?;

        info!("Appointment {} cancelled by {}", appointment_id, actor.role);
        self.publish_cancelled(&cancelled, actor.role).await;
        Ok(cancelled)
    }

    async fn publish_cancelled(&self, appointment: &Appointment, by: ActorRole) {
        self.notifier
            .publish(DomainEvent::BookingCancelled {
                appointment_id: appointment.id,
                physician_id: appointment.physician_id,
                patient_id: appointment.patient_id,
                cancelled_by: by,
            })
            .await;
    }

    // ==========================================================================
    // SESSION-FACING TRANSITIONS
    // ==========================================================================

    /// CONFIRMED -> IN_PROGRESS with the allocated room and the starter's presence.
    pub async fn begin_session(
        &self,
        appointment_id: Uuid,
        starter: ActorRole,
        room_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let mut update = AppointmentUpdate::presence(starter, true);
        update.room_id = Some(room_id.to_string());
        update.started_at = Some(started_at);
        self.transition(appointment_id, Transition::BeginSession, update)
            .await
    }

    /// Persist a presence flag of a live session.
    pub async fn mark_presence(
        &self,
        appointment_id: Uuid,
        role: ActorRole,
        present: bool,
    ) -> Result<Appointment, AppointmentError> {
        self.store
            .update_if(
                appointment_id,
                &[AppointmentStatus::InProgress],
                AppointmentUpdate::presence(role, present),
                self.now(),
            )
            .await
            .map_err(|err| match err {
                StoreError::StateConflict(current) => AppointmentError::InvalidState {
                    current,
                    action: "update presence of",
                },
                other => other.into(),
            })
    }

    /// IN_PROGRESS -> COMPLETED; emits `session_completed`.
    pub async fn complete_session(
        &self,
        appointment_id: Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<Appointment, AppointmentError> {
        let update = AppointmentUpdate {
            ended_at: Some(ended_at),
            physician_present: Some(false),
            patient_present: Some(false),
            ..AppointmentUpdate::default()
        };
        let completed = self
            .transition(appointment_id, Transition::CompleteSession, update)
            .await?;

        self.notifier
            .publish(DomainEvent::SessionCompleted {
                appointment_id,
                physician_id: completed.physician_id,
                patient_id: completed.patient_id,
                ended_at,
            })
            .await;
        Ok(completed)
    }

    /// CONFIRMED -> CANCELLED for an appointment nobody started in time.
    pub async fn cancel_no_show(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        let update = AppointmentUpdate {
            cancelled_by: Some(ActorRole::System),
            ..AppointmentUpdate::default()
        };
        let cancelled = self
            .transition(appointment_id, Transition::CancelNoShow, update)
            .await?;
        warn!("Appointment {} cancelled as no-show", appointment_id);
        self.publish_cancelled(&cancelled, ActorRole::System).await;
        Ok(cancelled)
    }

    pub async fn list_unstarted_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.list_unstarted_before(cutoff).await?)
    }

    /// Live sessions some participant is still recorded as present in.
    pub async fn list_present_in_progress(&self) -> Result<Vec<Appointment>, AppointmentError> {
        Ok(self.store.list_present_in_progress().await?)
    }

    // ==========================================================================
    // HOLD EXPIRY
    // ==========================================================================

    /// Move every lapsed reservation to EXPIRED. Returns how many expired.
    ///
    /// Each appointment is handled on its own; one that was confirmed or
    /// cancelled in the meantime is skipped.
    pub async fn expire_stale_holds(&self) -> Result<usize, AppointmentError> {
        let now = self.now();
        let candidates = self.store.list_expired_holds(now).await?;
        let mut expired = 0;

        for appointment in candidates {
            match self
                .transition(appointment.id, Transition::Expire, AppointmentUpdate::default())
                .await
            {
                Ok(_) => {
                    expired += 1;
                    info!(
                        "Reservation {} expired (hold ended {:?})",
                        appointment.id, appointment.hold_expires_at
                    );
                }
                Err(AppointmentError::InvalidState { current, .. }) => {
                    debug!("Skipping expiry of {}: now {}", appointment.id, current);
                }
                Err(err) => {
                    warn!("Failed to expire reservation {}: {}", appointment.id, err);
                }
            }
        }

        Ok(expired)
    }

    // ==========================================================================
    // QUERIES
    // ==========================================================================

    pub async fn get(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(appointment_id)
            .await?
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn get_for_actor(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get(appointment_id).await?;
        if !actor.is_system() && !appointment.is_participant(actor) {
            return Err(AppointmentError::NotParticipant);
        }
        Ok(appointment)
    }

    /// Appointments of a participant split into upcoming (still ahead or live)
    /// and past, both ascending.
    pub async fn list_for_actor(&self, actor: &Actor) -> Result<AppointmentListing, AppointmentError> {
        let now = self.now();
        let (upcoming, past): (Vec<_>, Vec<_>) = self
            .store
            .list_for_participant(actor)
            .await?
            .into_iter()
            .partition(|a| {
                a.status == AppointmentStatus::InProgress
                    || (!a.status.is_terminal() && a.ends_at() > now)
            });

        Ok(AppointmentListing { upcoming, past })
    }
}
