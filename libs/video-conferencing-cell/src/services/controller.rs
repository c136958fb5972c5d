// libs/video-conferencing-cell/src/services/controller.rs
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentError, AppointmentStatus, BookingLedger};
use shared_config::SchedulingConfig;
use shared_models::{Actor, ActorRole};

use crate::models::{Presence, Session, SessionError, SessionView};
use crate::services::room::RoomProvider;

type SessionSlot = Arc<Mutex<Option<Session>>>;

/// Drives CONFIRMED -> IN_PROGRESS -> COMPLETED for teleconsultations.
///
/// Each appointment has its own lock so both participants pressing "start"
/// at once allocate a single room. Appointment state itself is written only
/// through the ledger.
pub struct SessionController {
    ledger: Arc<BookingLedger>,
    rooms: Arc<dyn RoomProvider>,
    sessions: RwLock<HashMap<Uuid, SessionSlot>>,
    join_window: Duration,
    heartbeat_interval_seconds: i64,
    presence_timeout: Duration,
}

fn participant_role(actor: &Actor) -> Result<ActorRole, SessionError> {
    match actor.role {
        ActorRole::Physician | ActorRole::Patient => Ok(actor.role),
        ActorRole::System => Err(SessionError::Unauthorized),
    }
}

fn stored_presence(appointment: &Appointment, role: ActorRole) -> bool {
    match role {
        ActorRole::Physician => appointment.physician_present,
        ActorRole::Patient => appointment.patient_present,
        ActorRole::System => false,
    }
}

impl SessionController {
    pub fn new(
        ledger: Arc<BookingLedger>,
        rooms: Arc<dyn RoomProvider>,
        config: &SchedulingConfig,
    ) -> Self {
        Self {
            ledger,
            rooms,
            sessions: RwLock::new(HashMap::new()),
            join_window: Duration::minutes(config.join_window_minutes_before.max(0)),
            heartbeat_interval_seconds: config.heartbeat_interval_seconds.max(1),
            presence_timeout: Duration::seconds(config.presence_timeout_seconds.max(1)),
        }
    }

    async fn slot(&self, appointment_id: Uuid) -> SessionSlot {
        if let Some(slot) = self.sessions.read().await.get(&appointment_id) {
            return slot.clone();
        }
        self.sessions
            .write()
            .await
            .entry(appointment_id)
            .or_default()
            .clone()
    }

    fn view(&self, appointment: &Appointment, session: Option<&Session>) -> SessionView {
        let presence = match (appointment.status, session) {
            (AppointmentStatus::InProgress, Some(session)) => {
                session.presence(self.ledger.now(), self.presence_timeout)
            }
            _ => Presence::default(),
        };
        SessionView {
            appointment_id: appointment.id,
            status: appointment.status,
            room_id: appointment.room_id.clone(),
            started_at: appointment.started_at,
            ended_at: appointment.ended_at,
            presence,
            heartbeat_interval_seconds: self.heartbeat_interval_seconds,
        }
    }

    /// Rebuild the live record of an IN_PROGRESS appointment this process
    /// has no session for, e.g. after a restart.
    fn rehydrate(&self, appointment: &Appointment) -> Result<Session, SessionError> {
        let room_id = appointment.room_id.clone().ok_or(SessionError::InvalidState {
            current: appointment.status,
            action: "rejoin",
        })?;
        let now = self.ledger.now();
        let mut session = Session::new(
            appointment.id,
            room_id,
            appointment.started_at.unwrap_or(now),
        );
        // Stored flags get one timeout of grace to heartbeat again.
        for role in [ActorRole::Physician, ActorRole::Patient] {
            if stored_presence(appointment, role) {
                session.touch(role, now);
            }
        }
        info!("Rehydrated session of appointment {} (room {})", appointment.id, session.room_id);
        Ok(session)
    }

    /// Record a heartbeat and persist the presence flag when it flips.
    async fn join(
        &self,
        appointment: Appointment,
        session: &mut Option<Session>,
        role: ActorRole,
    ) -> Result<SessionView, SessionError> {
        if session.is_none() {
            *session = Some(self.rehydrate(&appointment)?);
        }
        let live = session.as_mut().ok_or(SessionError::InvalidState {
            current: appointment.status,
            action: "join",
        })?;
        live.touch(role, self.ledger.now());

        let appointment = if stored_presence(&appointment, role) {
            appointment
        } else {
            self.ledger.mark_presence(appointment.id, role, true).await?
        };
        Ok(self.view(&appointment, Some(&*live)))
    }

    /// First caller allocates the room and moves the appointment to
    /// IN_PROGRESS; later callers join the same room.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn start(&self, appointment_id: Uuid, actor: &Actor) -> Result<SessionView, SessionError> {
        let role = participant_role(actor)?;
        self.ledger.get_for_actor(appointment_id, actor).await?;

        let slot = self.slot(appointment_id).await;
        let mut session = slot.lock().await;

        // Re-read under the lock; the other participant may have just started.
        let appointment = self.ledger.get(appointment_id).await?;
        match appointment.status {
            AppointmentStatus::InProgress => {
                debug!("{} joining running session {}", role, appointment_id);
                self.join(appointment, &mut session, role).await
            }
            AppointmentStatus::Confirmed => {
                let now = self.ledger.now();
                let opens_at = appointment.scheduled_at - self.join_window;
                if now < opens_at {
                    return Err(SessionError::TooEarly { opens_at });
                }

                let room_id = self.rooms.allocate_room(appointment_id).await?;
                match self
                    .ledger
                    .begin_session(appointment_id, role, &room_id, now)
                    .await
                {
                    Ok(started) => {
                        let mut live = Session::new(appointment_id, room_id, now);
                        live.touch(role, now);
                        info!(
                            "Session of appointment {} started by {} in room {}",
                            appointment_id, role, live.room_id
                        );
                        let view = self.view(&started, Some(&live));
                        *session = Some(live);
                        Ok(view)
                    }
                    Err(err) => {
                        self.release(&room_id).await;
                        match err {
                            // Started elsewhere between our read and write.
                            AppointmentError::InvalidState {
                                current: AppointmentStatus::InProgress,
                                ..
                            } => {
                                let appointment = self.ledger.get(appointment_id).await?;
                                self.join(appointment, &mut session, role).await
                            }
                            other => Err(other.into()),
                        }
                    }
                }
            }
            current => Err(SessionError::InvalidState {
                current,
                action: "start",
            }),
        }
    }

    /// Liveness ping from a connected client.
    pub async fn heartbeat(&self, appointment_id: Uuid, actor: &Actor) -> Result<SessionView, SessionError> {
        let role = participant_role(actor)?;
        let appointment = self.ledger.get_for_actor(appointment_id, actor).await?;
        if appointment.status != AppointmentStatus::InProgress {
            return Err(SessionError::InvalidState {
                current: appointment.status,
                action: "heartbeat",
            });
        }

        let slot = self.slot(appointment_id).await;
        let mut session = slot.lock().await;
        self.join(appointment, &mut session, role).await
    }

    /// IN_PROGRESS -> COMPLETED. A second end is an error.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn end(&self, appointment_id: Uuid, actor: &Actor) -> Result<SessionView, SessionError> {
        participant_role(actor)?;
        self.ledger.get_for_actor(appointment_id, actor).await?;

        let slot = self.slot(appointment_id).await;
        let mut session = slot.lock().await;

        let completed = self
            .ledger
            .complete_session(appointment_id, self.ledger.now())
            .await?;

        if let Some(room_id) = completed.room_id.as_deref() {
            self.release(room_id).await;
        }
        info!("Session of appointment {} ended by {}", appointment_id, actor.role);

        *session = None;
        drop(session);
        self.sessions.write().await.remove(&appointment_id);

        Ok(self.view(&completed, None))
    }

    /// Read-only view for either participant.
    pub async fn presence(&self, appointment_id: Uuid, actor: &Actor) -> Result<SessionView, SessionError> {
        let appointment = self.ledger.get_for_actor(appointment_id, actor).await?;
        let slot = self.sessions.read().await.get(&appointment_id).cloned();
        match slot {
            Some(slot) => {
                let session = slot.lock().await;
                Ok(self.view(&appointment, session.as_ref()))
            }
            None => Ok(self.view(&appointment, None)),
        }
    }

    async fn release(&self, room_id: &str) {
        if let Err(err) = self.rooms.release_room(room_id).await {
            warn!("Failed to release room {}: {}", room_id, err);
        }
    }

    /// Track in-progress appointments with stored presence that this process
    /// holds no session for, so their flags can lapse without a rejoin.
    async fn adopt_orphaned_sessions(&self) -> Result<usize, SessionError> {
        let mut adopted = 0;
        for appointment in self.ledger.list_present_in_progress().await? {
            if self.sessions.read().await.contains_key(&appointment.id) {
                continue;
            }
            let slot = self.slot(appointment.id).await;
            let mut session = slot.lock().await;
            if session.is_none() {
                match self.rehydrate(&appointment) {
                    Ok(live) => {
                        *session = Some(live);
                        adopted += 1;
                    }
                    Err(err) => warn!("Cannot track session of {}: {}", appointment.id, err),
                }
            }
        }
        Ok(adopted)
    }

    /// Write stale presence back as false and forget sessions whose
    /// appointment is no longer live. Returns how many flags were cleared.
    pub async fn reap_stale_presence(&self) -> Result<usize, SessionError> {
        let adopted = self.adopt_orphaned_sessions().await?;
        if adopted > 0 {
            debug!("Presence sweep picked up {} sessions without a live record", adopted);
        }

        let slots: Vec<(Uuid, SessionSlot)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, slot)| (*id, slot.clone()))
            .collect();

        let now = self.ledger.now();
        let mut cleared = 0;
        let mut finished = Vec::new();

        for (appointment_id, slot) in slots {
            let session = slot.lock().await;
            let Some(live) = session.as_ref() else {
                finished.push(appointment_id);
                continue;
            };

            let appointment = match self.ledger.get(appointment_id).await {
                Ok(appointment) => appointment,
                Err(AppointmentError::NotFound(_)) => {
                    finished.push(appointment_id);
                    continue;
                }
                Err(err) => {
                    warn!("Presence sweep skipped {}: {}", appointment_id, err);
                    continue;
                }
            };
            if appointment.status != AppointmentStatus::InProgress {
                finished.push(appointment_id);
                continue;
            }

            for role in [ActorRole::Physician, ActorRole::Patient] {
                if stored_presence(&appointment, role)
                    && !live.is_present(role, now, self.presence_timeout)
                {
                    match self.ledger.mark_presence(appointment_id, role, false).await {
                        Ok(_) => {
                            cleared += 1;
                            debug!("{} of appointment {} went away", role, appointment_id);
                        }
                        Err(err) => warn!("Failed to clear presence of {}: {}", appointment_id, err),
                    }
                }
            }
        }

        if !finished.is_empty() {
            let mut sessions = self.sessions.write().await;
            for appointment_id in finished {
                // Only drop idle slots; a start may be holding one right now.
                if let Some(slot) = sessions.get(&appointment_id) {
                    if Arc::strong_count(slot) == 1 {
                        sessions.remove(&appointment_id);
                    }
                }
            }
        }

        Ok(cleared)
    }

    /// Cancel confirmed appointments nobody started within `grace` of their
    /// scheduled instant.
    pub async fn cancel_no_shows(&self, grace: Duration) -> Result<usize, SessionError> {
        let cutoff = self.ledger.now() - grace;
        let mut cancelled = 0;

        for appointment in self.ledger.list_unstarted_before(cutoff).await? {
            match self.ledger.cancel_no_show(appointment.id).await {
                Ok(_) => cancelled += 1,
                Err(AppointmentError::InvalidState { current, .. }) => {
                    debug!("Skipping no-show of {}: now {}", appointment.id, current);
                }
                Err(err) => warn!("Failed to cancel no-show {}: {}", appointment.id, err),
            }
        }

        Ok(cancelled)
    }
}
