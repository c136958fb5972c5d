use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use appointment_cell::{Appointment, AppointmentError, AppointmentStatus, BookingLedger, PricingEngine};
use shared_models::{Actor, ActorRole};

use crate::models::{
    Charge, ChargeStatus, ChargeStatusView, ChargeTicket, PaymentError, ProviderChargeStatus,
};
use crate::services::provider::PaymentProvider;
use crate::services::store::{ChargeStore, ChargeStoreError};

/// Turns a RESERVED appointment into a CONFIRMED one through a payment.
///
/// The charge is persisted as APPROVED before the ledger is asked to confirm,
/// so a crash in between leaves the appointment RESERVED and the next poll
/// (or webhook delivery) finishes the confirmation.
pub struct PaymentGate {
    ledger: Arc<BookingLedger>,
    pricing: Arc<PricingEngine>,
    provider: Arc<dyn PaymentProvider>,
    charges: Arc<dyn ChargeStore>,
    poll_interval_seconds: u64,
}

impl PaymentGate {
    pub fn new(
        ledger: Arc<BookingLedger>,
        pricing: Arc<PricingEngine>,
        provider: Arc<dyn PaymentProvider>,
        charges: Arc<dyn ChargeStore>,
        poll_interval_seconds: u64,
    ) -> Self {
        Self {
            ledger,
            pricing,
            provider,
            charges,
            poll_interval_seconds: poll_interval_seconds.max(1),
        }
    }

    fn ticket(&self, charge: &Charge) -> ChargeTicket {
        ChargeTicket {
            charge_id: charge.id,
            appointment_id: charge.appointment_id,
            payable_code: charge.payable_code.clone(),
            amount_cents: charge.amount_cents,
            currency: charge.currency.clone(),
            expires_at: charge.expires_at,
            status: charge.status,
            poll_interval_seconds: self.poll_interval_seconds,
        }
    }

    fn view(&self, charge: &Charge, appointment_status: Option<AppointmentStatus>) -> ChargeStatusView {
        ChargeStatusView {
            charge_id: charge.id,
            appointment_id: charge.appointment_id,
            status: charge.status,
            appointment_status,
            expires_at: charge.expires_at,
            poll_interval_seconds: self.poll_interval_seconds,
            refund_required: false,
        }
    }

    fn ensure_payable(&self, appointment: &Appointment) -> Result<(), PaymentError> {
        match appointment.status {
            AppointmentStatus::Reserved if appointment.hold_lapsed(self.ledger.now()) => {
                Err(PaymentError::PaymentExpired)
            }
            AppointmentStatus::Reserved => Ok(()),
            AppointmentStatus::Confirmed
            | AppointmentStatus::InProgress
            | AppointmentStatus::Completed => Err(PaymentError::AlreadyConfirmed),
            AppointmentStatus::Expired => Err(PaymentError::PaymentExpired),
            AppointmentStatus::Cancelled => Err(PaymentError::NotPayable(appointment.status)),
        }
    }

    /// Create (or return the pending) charge of a reservation.
    #[instrument(skip(self, actor), fields(actor_id = %actor.id))]
    pub async fn initiate_charge(
        &self,
        appointment_id: Uuid,
        actor: &Actor,
    ) -> Result<ChargeTicket, PaymentError> {
        let appointment = self.ledger.get_for_actor(appointment_id, actor).await?;
        if actor.role != ActorRole::Patient {
            return Err(PaymentError::NotPatient);
        }
        self.ensure_payable(&appointment)?;

        if let Some(existing) = self.charges.latest_for_appointment(appointment_id).await? {
            match existing.status {
                ChargeStatus::Pending if existing.expires_at > self.ledger.now() => {
                    debug!("Returning pending charge {} for appointment {}", existing.id, appointment_id);
                    return Ok(self.ticket(&existing));
                }
                ChargeStatus::Pending | ChargeStatus::Approved => {
                    // Settle whatever the provider says before deciding.
                    let view = self.poll_status(existing.id).await?;
                    match view.status {
                        ChargeStatus::Approved => return Err(PaymentError::AlreadyConfirmed),
                        ChargeStatus::Pending => {
                            if let Some(current) = self.charges.get(existing.id).await? {
                                return Ok(self.ticket(&current));
                            }
                        }
                        ChargeStatus::Failed | ChargeStatus::Expired => {}
                    }
                }
                ChargeStatus::Failed | ChargeStatus::Expired => {}
            }
        }

        // Price is locked now; later plan changes don't touch this charge.
        let quote = self.pricing.quote_for(&appointment).await?;
        let provider_charge = self
            .provider
            .create_charge(quote.amount_cents, &quote.currency, &appointment.patient_id.to_string())
            .await?;

        let now = self.ledger.now();
        let charge = Charge {
            id: Uuid::new_v4(),
            appointment_id,
            amount_cents: quote.amount_cents,
            currency: quote.currency,
            external_id: provider_charge.external_id,
            payable_code: provider_charge.payable_code,
            status: ChargeStatus::Pending,
            expires_at: provider_charge.expires_at,
            created_at: now,
            updated_at: now,
        };

        match self.charges.insert(charge).await {
            Ok(stored) => {
                info!(
                    "Charge {} of {} {} created for appointment {}",
                    stored.id, stored.amount_cents, stored.currency, appointment_id
                );
                Ok(self.ticket(&stored))
            }
            Err(ChargeStoreError::ActiveChargeExists(_)) => {
                // A concurrent request created one first; hand out that one.
                let winner = self
                    .charges
                    .latest_for_appointment(appointment_id)
                    .await?
                    .ok_or_else(|| PaymentError::Store("active charge vanished".to_string()))?;
                Ok(self.ticket(&winner))
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Poll on behalf of a participant of the charged appointment.
    pub async fn poll_status_for(
        &self,
        charge_id: Uuid,
        actor: &Actor,
    ) -> Result<ChargeStatusView, PaymentError> {
        let charge = self
            .charges
            .get(charge_id)
            .await?
            .ok_or(PaymentError::ChargeNotFound(charge_id))?;
        self.ledger.get_for_actor(charge.appointment_id, actor).await?;
        self.poll_status(charge_id).await
    }

    /// Non-blocking status check; safe to repeat.
    #[instrument(skip(self))]
    pub async fn poll_status(&self, charge_id: Uuid) -> Result<ChargeStatusView, PaymentError> {
        let charge = self
            .charges
            .get(charge_id)
            .await?
            .ok_or(PaymentError::ChargeNotFound(charge_id))?;

        match charge.status {
            ChargeStatus::Approved => self.settle(charge).await,
            ChargeStatus::Failed | ChargeStatus::Expired => {
                let appointment = self.ledger.get(charge.appointment_id).await?;
                Ok(self.view(&charge, Some(appointment.status)))
            }
            ChargeStatus::Pending => self.refresh_pending(charge).await,
        }
    }

    async fn refresh_pending(&self, charge: Charge) -> Result<ChargeStatusView, PaymentError> {
        let now = self.ledger.now();
        // Asked even after expiry: a late settlement still counts.
        let provider_status = self.provider.get_charge_status(&charge.external_id).await?;

        let next = match provider_status {
            ProviderChargeStatus::Approved => ChargeStatus::Approved,
            ProviderChargeStatus::Failed => ChargeStatus::Failed,
            ProviderChargeStatus::Pending if now >= charge.expires_at => ChargeStatus::Expired,
            ProviderChargeStatus::Pending => {
                let appointment = self.ledger.get(charge.appointment_id).await?;
                return Ok(self.view(&charge, Some(appointment.status)));
            }
        };

        let updated = match self
            .charges
            .update_status_if(charge.id, ChargeStatus::Pending, next, now)
            .await
        {
            Ok(updated) => updated,
            Err(ChargeStoreError::StateConflict(_)) => self
                .charges
                .get(charge.id)
                .await?
                .ok_or(PaymentError::ChargeNotFound(charge.id))?,
            Err(err) => return Err(err.into()),
        };

        match updated.status {
            ChargeStatus::Approved => self.settle(updated).await,
            status => {
                if status == ChargeStatus::Expired {
                    info!(
                        "Charge {} expired unpaid; appointment {} left for the hold sweep",
                        updated.id, updated.appointment_id
                    );
                }
                let appointment = self.ledger.get(updated.appointment_id).await?;
                Ok(self.view(&updated, Some(appointment.status)))
            }
        }
    }

    /// Confirm the appointment of an approved charge.
    async fn settle(&self, charge: Charge) -> Result<ChargeStatusView, PaymentError> {
        match self.ledger.confirm(charge.appointment_id, charge.id).await {
            Ok(appointment) => Ok(self.view(&charge, Some(appointment.status))),
            Err(AppointmentError::InvalidState { current, .. }) => {
                // Money arrived for a booking that can no longer be honoured.
                error!(
                    "Charge {} approved but appointment {} is {}: refund required",
                    charge.id, charge.appointment_id, current
                );
                Ok(ChargeStatusView {
                    refund_required: true,
                    ..self.view(&charge, Some(current))
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Provider notification. The payload is only used to find the charge;
    /// its status is always re-read from the provider.
    pub async fn handle_webhook(
        &self,
        external_id: &str,
    ) -> Result<Option<ChargeStatusView>, PaymentError> {
        let Some(charge) = self.charges.find_by_external_id(external_id).await? else {
            warn!("Webhook for unknown provider charge {}", external_id);
            return Ok(None);
        };
        debug!("Webhook for charge {} ({})", charge.id, external_id);
        self.poll_status(charge.id).await.map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::provider::{MockPaymentProvider, ProviderError};
    use crate::services::store::InMemoryChargeStore;
    use appointment_cell::{AppointmentKind, InMemoryAppointmentStore, TracingNotificationSink};
    use assert_matches::assert_matches;
    use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
    use doctor_cell::{InMemoryPhysicianDirectory, NewAvailabilityRule, Physician, PhysicianDirectory};
    use patient_cell::InMemorySubscriptionDirectory;
    use shared_config::{PaymentConfig, SchedulingConfig};
    use shared_utils::ManualClock;

    async fn gate_with(provider: MockPaymentProvider) -> (PaymentGate, Arc<BookingLedger>, Uuid) {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap()));
        let directory = Arc::new(InMemoryPhysicianDirectory::new());
        let physician = Physician {
            id: Uuid::new_v4(),
            display_name: "Dr. Mock".to_string(),
            consultation_duration_minutes: 30,
            buffer_minutes: 0,
            consultation_price_cents: None,
            accepts_new_patients: true,
        };
        directory.upsert_physician(physician.clone()).await;
        directory
            .replace_rules(
                physician.id,
                vec![NewAvailabilityRule {
                    day_of_week: 2,
                    start_time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                    end_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
                }],
            )
            .await
            .unwrap();

        let ledger = Arc::new(BookingLedger::new(
            Arc::new(InMemoryAppointmentStore::new()),
            directory.clone(),
            Arc::new(TracingNotificationSink),
            clock.clone(),
            &SchedulingConfig::default(),
        ));
        let pricing = Arc::new(PricingEngine::new(
            directory,
            Arc::new(InMemorySubscriptionDirectory::new()),
            clock,
            &PaymentConfig::default(),
        ));
        let gate = PaymentGate::new(
            ledger.clone(),
            pricing,
            Arc::new(provider),
            Arc::new(InMemoryChargeStore::new()),
            3,
        );
        (gate, ledger, physician.id)
    }

    #[tokio::test]
    async fn provider_outage_creates_no_charge() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_charge()
            .times(2)
            .returning(|_, _, _| Err(ProviderError::Decode("down".to_string())));

        let (gate, ledger, physician_id) = gate_with(provider).await;
        let patient = Actor::patient(Uuid::new_v4());
        let appointment = ledger
            .reserve(
                physician_id,
                &patient,
                NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
                NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                AppointmentKind::FirstVisit,
            )
            .await
            .unwrap();

        assert_matches!(
            gate.initiate_charge(appointment.id, &patient).await,
            Err(PaymentError::Provider(_))
        );
        // Nothing was stored, so a retry goes back to the provider.
        assert_matches!(
            gate.initiate_charge(appointment.id, &patient).await,
            Err(PaymentError::Provider(_))
        );
    }

    #[tokio::test]
    async fn price_sent_to_provider_is_the_quote() {
        let mut provider = MockPaymentProvider::new();
        provider
            .expect_create_charge()
            .withf(|amount, currency, _| *amount == 14900 && currency == "BRL")
            .times(1)
            .returning(|_, _, _| {
                Ok(crate::models::ProviderCharge {
                    external_id: "ext_1".to_string(),
                    payable_code: "PIX-1".to_string(),
                    expires_at: Utc.with_ymd_and_hms(2026, 3, 2, 12, 10, 0).unwrap(),
                })
            });

        let (gate, ledger, physician_id) = gate_with(provider).await;
        let patient = Actor::patient(Uuid::new_v4());
        let appointment = ledger
            .reserve(
                physician_id,
                &patient,
                NaiveDate::from_ymd_opt(2026, 3, 3).unwrap(),
                NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
                AppointmentKind::FirstVisit,
            )
            .await
            .unwrap();

        let ticket = gate.initiate_charge(appointment.id, &patient).await.unwrap();
        assert_eq!(ticket.amount_cents, 14900);
        assert_eq!(ticket.poll_interval_seconds, 3);

        // Re-requesting hands back the same pending charge.
        let again = gate.initiate_charge(appointment.id, &patient).await.unwrap();
        assert_eq!(again.charge_id, ticket.charge_id);
    }
}
