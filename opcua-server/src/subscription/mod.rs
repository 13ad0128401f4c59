//! Subscription engine: monitored items, publishing cycles and publish
//! request matching

pub mod engine;
pub mod monitored_item;
pub mod state;

pub use engine::SubscriptionEngine;
pub use monitored_item::MonitoredItem;
pub use state::{PublishingParameters, Subscription, TickOutcome};
