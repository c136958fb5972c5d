pub mod actor;
pub mod auth;
pub mod error;

pub use actor::{Actor, ActorRole};
pub use auth::User;
pub use error::AppError;
