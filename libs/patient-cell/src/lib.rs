pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::PatientCellState;
pub use models::*;
pub use router::patient_routes;
pub use services::*;
