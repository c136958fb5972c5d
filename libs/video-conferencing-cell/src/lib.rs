// libs/video-conferencing-cell/src/lib.rs
//! # Video Conferencing Cell
//!
//! Teleconsultation sessions on top of confirmed appointments. The cell owns
//! the live session state (rooms and heartbeats); the appointment status,
//! room id and durable presence flags are written through the booking ledger.
//!
//! ```text
//! CONFIRMED --start()--> IN_PROGRESS --end()--> COMPLETED
//! CONFIRMED --no-show sweep--> CANCELLED   (only with NO_SHOW_GRACE_MINUTES)
//! ```
//!
//! ## API Endpoints
//!
//! - `POST /sessions/{appointment_id}/start` - Start or join the room
//! - `POST /sessions/{appointment_id}/heartbeat` - Presence ping
//! - `POST /sessions/{appointment_id}/end` - Complete the consultation
//! - `GET /sessions/{appointment_id}` - Current status and presence
//!
//! Rooms come from Cloudflare Realtime when `CLOUDFLARE_REALTIME_APP_ID` and
//! `CLOUDFLARE_REALTIME_API_TOKEN` are set, otherwise from a local generator.

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use handlers::SessionCellState;
pub use models::*;
pub use router::session_routes;
pub use services::*;
