use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::TxErrorKind;
use crate::tx_queue::CartTxStatus;

/// Capacity of each subscriber's channel; events beyond it are dropped for that subscriber
const SUBSCRIBER_BUFFER: usize = 256;

/// Change notifications emitted by the cart store
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum CartEvent {
    Added {
        id: String,
        label: String,
    },
    Removed {
        id: String,
    },
    StatusChanged {
        id: String,
        status: CartTxStatus,
        tx_hash: Option<String>,
        error_kind: Option<TxErrorKind>,
    },
    Cleared,
}

/// Fans cart events out to subscribers.
///
/// `broadcast()` never blocks: full or closed subscriber channels are skipped
/// and closed ones are pruned.
pub struct CartEventBroadcaster {
    clients: DashMap<String, mpsc::Sender<CartEvent>>,
}

impl CartEventBroadcaster {
    pub fn new() -> Self {
        Self {
            clients: DashMap::new(),
        }
    }

    /// Subscribe a new client and return (client_id, receiver).
    pub fn subscribe(&self) -> (String, mpsc::Receiver<CartEvent>) {
        let client_id = Uuid::new_v4().to_string();
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        self.clients.insert(client_id.clone(), tx);
        log::debug!("[Events] Client {} subscribed", client_id);
        (client_id, rx)
    }

    pub fn unsubscribe(&self, client_id: &str) {
        self.clients.remove(client_id);
        log::debug!("[Events] Client {} unsubscribed", client_id);
    }

    pub fn broadcast(&self, event: CartEvent) {
        let mut closed = Vec::new();
        for entry in self.clients.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    log::warn!("[Events] Client {} is lagging, dropping event", entry.key());
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(entry.key().clone()),
            }
        }
        for id in closed {
            self.clients.remove(&id);
        }
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }
}

impl Default for CartEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
