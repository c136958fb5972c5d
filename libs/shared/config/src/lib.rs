use std::env;
use std::str::FromStr;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    Memory,
    Supabase,
}

impl FromStr for StorageBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "memory" | "in_memory" => Ok(StorageBackend::Memory),
            "supabase" => Ok(StorageBackend::Supabase),
            other => Err(format!("unknown storage backend: {}", other)),
        }
    }
}

/// Timing rules for reservations, slot listing and live sessions.
#[derive(Debug, Clone)]
pub struct SchedulingConfig {
    /// How long a RESERVED appointment waits for payment before it expires.
    pub hold_minutes: i64,
    /// Slots for today must start at least this far after "now".
    pub min_lead_time_minutes: i64,
    /// How early before the scheduled instant a session may be started.
    pub join_window_minutes_before: i64,
    pub heartbeat_interval_seconds: i64,
    pub presence_timeout_seconds: i64,
    /// Confirmed appointments never started by `scheduled_at + grace` are
    /// cancelled by the session sweep. `None` disables no-show handling.
    pub no_show_grace_minutes: Option<i64>,
    pub sweep_interval_seconds: u64,
    /// Physician-local clock offset from UTC shared by server and physicians.
    pub clinic_utc_offset_minutes: i32,
}

impl Default for SchedulingConfig {
    fn default() -> Self {
        Self {
            hold_minutes: 15,
            min_lead_time_minutes: 30,
            join_window_minutes_before: 15,
            heartbeat_interval_seconds: 15,
            presence_timeout_seconds: 45,
            no_show_grace_minutes: None,
            sweep_interval_seconds: 60,
            clinic_utc_offset_minutes: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentConfig {
    pub provider_base_url: String,
    pub provider_api_token: String,
    pub currency: String,
    pub platform_base_price_cents: i64,
    /// Lifetime of charges issued by the sandbox provider.
    pub charge_ttl_minutes: i64,
    pub poll_interval_seconds: u64,
    /// Sandbox charges report APPROVED on their first status check.
    pub sandbox_auto_approve: bool,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            provider_base_url: String::new(),
            provider_api_token: String::new(),
            currency: "BRL".to_string(),
            platform_base_price_cents: 14900,
            charge_ttl_minutes: 10,
            poll_interval_seconds: 3,
            sandbox_auto_approve: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub storage_backend: StorageBackend,
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,
    pub supabase_jwt_secret: String,
    pub cloudflare_realtime_app_id: String,
    pub cloudflare_realtime_api_token: String,
    pub cloudflare_realtime_base_url: String,
    pub scheduling: SchedulingConfig,
    pub payments: PaymentConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            storage_backend: StorageBackend::Memory,
            supabase_url: String::new(),
            supabase_anon_key: String::new(),
            supabase_service_role_key: String::new(),
            supabase_jwt_secret: String::new(),
            cloudflare_realtime_app_id: String::new(),
            cloudflare_realtime_api_token: String::new(),
            cloudflare_realtime_base_url: "https://rtc.live.cloudflare.com/v1".to_string(),
            scheduling: SchedulingConfig::default(),
            payments: PaymentConfig::default(),
        }
    }
}

fn string_var(key: &str, fallback: &str) -> String {
    env::var(key).unwrap_or_else(|_| {
        if fallback.is_empty() {
            warn!("{} not set, using empty value", key);
        }
        fallback.to_string()
    })
}

fn parsed_var<T>(key: &str, fallback: T) -> T
where
    T: FromStr + std::fmt::Debug,
{
    match env::var(key) {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {:?}", key, raw, fallback);
            fallback
        }),
        Err(_) => fallback,
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let defaults = AppConfig::default();
        let scheduling_defaults = SchedulingConfig::default();
        let payment_defaults = PaymentConfig::default();

        let config = Self {
            port: parsed_var("PORT", defaults.port),
            storage_backend: parsed_var("STORAGE_BACKEND", StorageBackend::Memory),
            supabase_url: string_var("SUPABASE_URL", ""),
            supabase_anon_key: string_var("SUPABASE_ANON_PUBLIC_KEY", ""),
            supabase_service_role_key: string_var("SUPABASE_SERVICE_ROLE_KEY", ""),
            supabase_jwt_secret: string_var("SUPABASE_JWT_SECRET", ""),
            cloudflare_realtime_app_id: string_var("CLOUDFLARE_REALTIME_APP_ID", ""),
            cloudflare_realtime_api_token: string_var("CLOUDFLARE_REALTIME_API_TOKEN", ""),
            cloudflare_realtime_base_url: string_var(
                "CLOUDFLARE_REALTIME_BASE_URL",
                &defaults.cloudflare_realtime_base_url,
            ),
            scheduling: SchedulingConfig {
                hold_minutes: parsed_var("HOLD_MINUTES", scheduling_defaults.hold_minutes),
                min_lead_time_minutes: parsed_var(
                    "MIN_LEAD_TIME_MINUTES",
                    scheduling_defaults.min_lead_time_minutes,
                ),
                join_window_minutes_before: parsed_var(
                    "JOIN_WINDOW_MINUTES",
                    scheduling_defaults.join_window_minutes_before,
                ),
                heartbeat_interval_seconds: parsed_var(
                    "HEARTBEAT_INTERVAL_SECONDS",
                    scheduling_defaults.heartbeat_interval_seconds,
                ),
                presence_timeout_seconds: parsed_var(
                    "PRESENCE_TIMEOUT_SECONDS",
                    scheduling_defaults.presence_timeout_seconds,
                ),
                no_show_grace_minutes: env::var("NO_SHOW_GRACE_MINUTES")
                    .ok()
                    .and_then(|raw| raw.trim().parse().ok()),
                sweep_interval_seconds: parsed_var(
                    "SWEEP_INTERVAL_SECONDS",
                    scheduling_defaults.sweep_interval_seconds,
                ),
                clinic_utc_offset_minutes: parsed_var(
                    "CLINIC_UTC_OFFSET_MINUTES",
                    scheduling_defaults.clinic_utc_offset_minutes,
                ),
            },
            payments: PaymentConfig {
                provider_base_url: env::var("PAYMENT_PROVIDER_URL").unwrap_or_default(),
                provider_api_token: env::var("PAYMENT_PROVIDER_TOKEN").unwrap_or_default(),
                currency: string_var("PAYMENT_CURRENCY", &payment_defaults.currency),
                platform_base_price_cents: parsed_var(
                    "PLATFORM_BASE_PRICE_CENTS",
                    payment_defaults.platform_base_price_cents,
                ),
                charge_ttl_minutes: parsed_var(
                    "CHARGE_TTL_MINUTES",
                    payment_defaults.charge_ttl_minutes,
                ),
                poll_interval_seconds: parsed_var(
                    "PAYMENT_POLL_INTERVAL_SECONDS",
                    payment_defaults.poll_interval_seconds,
                ),
                sandbox_auto_approve: parsed_var(
                    "SANDBOX_AUTO_APPROVE",
                    payment_defaults.sandbox_auto_approve,
                ),
            },
        };

        if config.storage_backend == StorageBackend::Supabase && !config.is_configured() {
            warn!("Supabase storage selected but not fully configured - missing environment variables");
        }

        config
    }

    pub fn is_configured(&self) -> bool {
        !self.supabase_url.is_empty()
            && !self.supabase_service_role_key.is_empty()
            && !self.supabase_jwt_secret.is_empty()
    }

    pub fn is_video_conferencing_configured(&self) -> bool {
        !self.cloudflare_realtime_app_id.is_empty()
            && !self.cloudflare_realtime_api_token.is_empty()
            && !self.cloudflare_realtime_base_url.is_empty()
    }

    pub fn is_payment_provider_configured(&self) -> bool {
        !self.payments.provider_base_url.is_empty() && !self.payments.provider_api_token.is_empty()
    }
}
