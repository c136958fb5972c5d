pub mod controller;
pub mod room;
pub mod sweeper;

pub use controller::SessionController;
pub use room::{CloudflareRoomProvider, LocalRoomProvider, RoomError, RoomProvider};
pub use sweeper::SessionSweeper;
