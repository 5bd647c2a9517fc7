//! Outbound notifications for escalations and daemon events.

mod events;
mod notifier;

pub use events::{EventType, WardenEvent};
pub use notifier::Notifier;
