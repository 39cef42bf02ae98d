//! Fan-out of transfer record changes to live observers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::types::TransferRecord;

/// Event name carried by every pushed message.
pub const TRANSFER_UPDATE_EVENT: &str = "transfer-update";

/// Per-subscriber buffer. A subscriber that falls this far behind misses
/// updates until it catches up.
pub const SUBSCRIBER_CAPACITY: usize = 256;

/// Wire shape of a pushed update.
#[derive(Debug, Serialize)]
pub struct TransferEvent<'a> {
    pub event: &'static str,
    pub record: &'a TransferRecord,
}

struct Subscriber {
    id: u64,
    tx: mpsc::Sender<String>,
}

/// Delivers serialized record updates to every subscriber.
///
/// Publishing never waits: a full subscriber is skipped for that message and
/// a closed one is dropped from the list.
pub struct ProgressBroadcaster {
    subscribers: Mutex<Vec<Subscriber>>,
    next_id: AtomicU64,
}

impl ProgressBroadcaster {
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register an observer. Only updates published after this call are
    /// delivered.
    pub fn subscribe(&self) -> (u64, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.lock().push(Subscriber { id, tx });
        debug!(subscriber = id, "Transfer observer subscribed");
        (id, rx)
    }

    /// Remove an observer explicitly. Dropping the receiver has the same
    /// effect at the next publish.
    pub fn unsubscribe(&self, id: u64) {
        self.lock().retain(|s| s.id != id);
    }

    pub fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    /// Serialize `record` once and offer it to every subscriber. Returns how
    /// many subscribers accepted the message.
    pub fn publish(&self, record: &TransferRecord) -> usize {
        let event = TransferEvent {
            event: TRANSFER_UPDATE_EVENT,
            record,
        };
        let payload = match serde_json::to_string(&event) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(transfer_id = %record.id, "Failed to serialize transfer update: {e}");
                return 0;
            }
        };

        let mut delivered = 0;
        self.lock().retain(|subscriber| {
            match subscriber.tx.try_send(payload.clone()) {
                Ok(()) => {
                    delivered += 1;
                    true
                }
                Err(mpsc::error::TrySendError::Full(_)) => {
                    debug!(subscriber = subscriber.id, "Observer lagging; update skipped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(subscriber = subscriber.id, "Observer gone; pruning");
                    false
                }
            }
        });
        delivered
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Subscriber>> {
        self.subscribers.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for ProgressBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
