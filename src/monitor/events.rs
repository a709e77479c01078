//! Significant-activity event bus
//!
//! Fan-out of classified events to downstream consumers (the decision
//! engine, the CLI printer). Built on a broadcast channel: slow consumers
//! lag and lose old events rather than stalling the monitoring worker.

use tokio::sync::broadcast;
use tracing::debug;

use super::classifier::SignificanceVerdict;
use super::normalizer::ActivityEvent;

/// An activity event that crossed the significance threshold, paired with
/// the verdict that admitted it
#[derive(Debug, Clone)]
pub struct SignificantActivity {
    pub event: ActivityEvent,
    pub verdict: SignificanceVerdict,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SignificantActivity>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SignificantActivity> {
        self.tx.subscribe()
    }

    /// Publish to all current subscribers. Publishing with no subscribers is
    /// a no-op, not an error.
    pub fn publish(&self, activity: SignificantActivity) {
        match self.tx.send(activity) {
            Ok(receivers) => {
                debug!(receivers, "Published significant activity");
            }
            Err(_) => {
                debug!("No subscribers for significant activity");
            }
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
