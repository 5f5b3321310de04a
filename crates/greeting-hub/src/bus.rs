//! Response bus: outcome delivery keyed by source id.
//!
//! Decouples sources from the arbiter. The arbiter publishes an outcome
//! under the originating source's id; only that source's standing
//! subscription receives it. Neither side holds a reference to the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use crate::types::Outcome;

#[derive(Clone, Default)]
pub struct ResponseBus {
    topics: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Outcome>>>>,
}

impl ResponseBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a standing subscription for a source id. A later subscription
    /// for the same id replaces the earlier one.
    pub fn subscribe(&self, source_id: &str) -> mpsc::UnboundedReceiver<Outcome> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        if topics.insert(source_id.to_string(), tx).is_some() {
            tracing::debug!(source_id, "Replaced existing response subscription");
        }
        rx
    }

    /// Deliver an outcome to the matching subscription, if any.
    pub fn publish(&self, source_id: &str, outcome: Outcome) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        match topics.get(source_id) {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    // Subscriber task is gone; drop the dead entry.
                    topics.remove(source_id);
                    tracing::debug!(source_id, "Dropped closed response subscription");
                }
            }
            None => {
                tracing::debug!(source_id, ?outcome, "No subscriber for outcome");
            }
        }
    }

    /// Remove a subscription.
    pub fn unsubscribe(&self, source_id: &str) {
        let mut topics = self.topics.lock().unwrap_or_else(|e| e.into_inner());
        topics.remove(source_id);
    }
}
