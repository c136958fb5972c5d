pub mod events;
pub mod handlers;
pub mod models;
pub mod router;
pub mod services;
pub mod store;

pub use events::{ChannelNotificationSink, DomainEvent, NotificationSink, TracingNotificationSink};
pub use handlers::AppointmentCellState;
pub use models::*;
pub use router::appointment_routes;
pub use services::*;
pub use store::{
    AppointmentStore, AppointmentUpdate, InMemoryAppointmentStore, StoreError,
    SupabaseAppointmentStore,
};
