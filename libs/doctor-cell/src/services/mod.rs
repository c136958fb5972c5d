pub mod availability;
pub mod directory;
pub mod supabase;

pub use availability::{day_of_week, validate_rules, AvailabilityResolver};
pub use directory::{InMemoryPhysicianDirectory, PhysicianDirectory};
pub use supabase::SupabasePhysicianDirectory;
