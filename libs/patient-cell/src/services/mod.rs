pub mod subscriptions;

pub use subscriptions::{
    InMemorySubscriptionDirectory, SubscriptionDirectory, SupabaseSubscriptionDirectory,
};
