pub mod gate;
pub mod provider;
pub mod store;

pub use gate::PaymentGate;
pub use provider::{HttpPaymentProvider, PaymentProvider, ProviderError, SandboxPaymentProvider};
pub use store::{ChargeStore, ChargeStoreError, InMemoryChargeStore, SupabaseChargeStore};
