//! In-process location event bus.
//!
//! The update handler and the sweeper publish here; the realtime relay and the
//! persistence task subscribe. Publishing never blocks: a subscriber that falls
//! behind skips the overflowed events and logs how many it lost.

use tokio::sync::broadcast;
use tracing::{trace, warn};

use crate::models::Fix;

pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq)]
pub enum LocationEvent {
    Updated(Fix),
    Removed { jeep_id: String },
}

#[derive(Debug, Clone)]
pub struct Hub {
    sender: broadcast::Sender<LocationEvent>,
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Hub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Returns the number of subscribers the event was delivered to.
    pub fn publish(&self, event: LocationEvent) -> usize {
        match self.sender.send(event) {
            Ok(n_subscribers) => n_subscribers,
            Err(_) => {
                trace!("no subscribers, event dropped");
                0
            }
        }
    }

    pub fn subscribe(&self, name: &'static str) -> Subscription {
        Subscription {
            name,
            receiver: self.sender.subscribe(),
        }
    }
}

pub struct Subscription {
    name: &'static str,
    receiver: broadcast::Receiver<LocationEvent>,
}

impl Subscription {
    /// Next event, or `None` once every publisher is gone.
    pub async fn next(&mut self) -> Option<LocationEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n_skipped)) => {
                    warn!(subscriber = self.name, n_skipped, "subscriber lagged behind");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}
