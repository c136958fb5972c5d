pub mod booking;
pub mod expiry;
pub mod lifecycle;
pub mod pricing;

pub use booking::BookingLedger;
pub use expiry::ExpirySweeper;
pub use lifecycle::Transition;
pub use pricing::{price_for, PriceSource, PricingEngine, Quote};
