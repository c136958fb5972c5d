use std::sync::Arc;
use tracing::{info, warn};

use appointment_cell::{
    AppointmentStore, BookingLedger, InMemoryAppointmentStore, PricingEngine,
    SupabaseAppointmentStore, TracingNotificationSink,
};
use doctor_cell::{InMemoryPhysicianDirectory, PhysicianDirectory, SupabasePhysicianDirectory};
use patient_cell::{InMemorySubscriptionDirectory, SubscriptionDirectory, SupabaseSubscriptionDirectory};
use payment_cell::{
    ChargeStore, HttpPaymentProvider, InMemoryChargeStore, PaymentGate, PaymentProvider,
    SandboxPaymentProvider, SupabaseChargeStore,
};
use shared_config::{AppConfig, StorageBackend};
use shared_database::SupabaseClient;
use shared_utils::{Clock, SystemClock};
use video_conferencing_cell::{CloudflareRoomProvider, LocalRoomProvider, RoomProvider, SessionController};

/// Every long-lived service, wired once at startup.
#[derive(Clone)]
pub struct AppServices {
    pub config: Arc<AppConfig>,
    pub directory: Arc<dyn PhysicianDirectory>,
    pub subscriptions: Arc<dyn SubscriptionDirectory>,
    pub ledger: Arc<BookingLedger>,
    pub pricing: Arc<PricingEngine>,
    pub gate: Arc<PaymentGate>,
    pub sessions: Arc<SessionController>,
}

struct Stores {
    directory: Arc<dyn PhysicianDirectory>,
    subscriptions: Arc<dyn SubscriptionDirectory>,
    appointments: Arc<dyn AppointmentStore>,
    charges: Arc<dyn ChargeStore>,
}

fn stores(config: &AppConfig) -> Stores {
    match config.storage_backend {
        StorageBackend::Supabase => {
            info!("Using Supabase storage at {}", config.supabase_url);
            let supabase = Arc::new(SupabaseClient::new(config));
            Stores {
                directory: Arc::new(SupabasePhysicianDirectory::new(supabase.clone())),
                subscriptions: Arc::new(SupabaseSubscriptionDirectory::new(supabase.clone())),
                appointments: Arc::new(SupabaseAppointmentStore::new(supabase.clone())),
                charges: Arc::new(SupabaseChargeStore::new(supabase)),
            }
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; data is lost on restart");
            Stores {
                directory: Arc::new(InMemoryPhysicianDirectory::new()),
                subscriptions: Arc::new(InMemorySubscriptionDirectory::new()),
                appointments: Arc::new(InMemoryAppointmentStore::new()),
                charges: Arc::new(InMemoryChargeStore::new()),
            }
        }
    }
}

impl AppServices {
    pub fn build(config: AppConfig) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let stores = stores(&config);

        let provider: Arc<dyn PaymentProvider> = if config.is_payment_provider_configured() {
            info!("Payment provider at {}", config.payments.provider_base_url);
            Arc::new(HttpPaymentProvider::new(&config.payments))
        } else {
            warn!(
                "PAYMENT_PROVIDER_URL not set, using sandbox payments (auto approve: {})",
                config.payments.sandbox_auto_approve
            );
            Arc::new(SandboxPaymentProvider::new(clock.clone(), &config.payments))
        };

        let rooms: Arc<dyn RoomProvider> = if config.is_video_conferencing_configured() {
            Arc::new(CloudflareRoomProvider::new(&config))
        } else {
            warn!("Cloudflare Realtime not configured, using local room ids");
            Arc::new(LocalRoomProvider)
        };

        let ledger = Arc::new(BookingLedger::new(
            stores.appointments,
            stores.directory.clone(),
            Arc::new(TracingNotificationSink),
            clock.clone(),
            &config.scheduling,
        ));
        let pricing = Arc::new(PricingEngine::new(
            stores.directory.clone(),
            stores.subscriptions.clone(),
            clock,
            &config.payments,
        ));
        let gate = Arc::new(PaymentGate::new(
            ledger.clone(),
            pricing.clone(),
            provider,
            stores.charges,
            config.payments.poll_interval_seconds,
        ));
        let sessions = Arc::new(SessionController::new(ledger.clone(), rooms, &config.scheduling));

        Self {
            config: Arc::new(config),
            directory: stores.directory,
            subscriptions: stores.subscriptions,
            ledger,
            pricing,
            gate,
            sessions,
        }
    }
}
