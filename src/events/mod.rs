//! Invalidation push channel.
//!
//! Mutating subsystems publish which data domains changed; UI layers (out
//! of scope here) subscribe and refetch. Publishing never blocks and never
//! fails: with no subscribers, or with lagging ones, events are dropped.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

const BUS_CAPACITY: usize = 64;

/// Data domains a subscriber can watch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Tasks,
    Prs,
    Workspaces,
    Worktrees,
    Hooks,
    Stats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidateEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub channels: Vec<Channel>,
}

impl InvalidateEvent {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            kind: "invalidate".to_string(),
            channels,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<InvalidateEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BUS_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, channels: Vec<Channel>) {
        let event = InvalidateEvent::new(channels);
        trace!(channels = ?event.channels, "Publishing invalidation");
        // No receivers is fine; the bus is fire-and-forget.
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InvalidateEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
