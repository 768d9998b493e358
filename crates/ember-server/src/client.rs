use std::net::SocketAddr;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ember_core::{BroadcastOutcome, ClientId};

/// Registry of all connected protocol clients.
///
/// Each client owns a bounded queue of outbound lines; only the client's
/// connection task writes to its socket.
pub struct ClientRegistry {
    clients: DashMap<ClientId, mpsc::Sender<String>>,
    max_send_queue: usize,
}

impl ClientRegistry {
    pub fn new(max_send_queue: usize) -> Self {
        Self {
            clients: DashMap::new(),
            max_send_queue: max_send_queue.max(1),
        }
    }

    /// Register a new client and return its ID and outbound queue.
    pub fn register(&self, peer: SocketAddr) -> (ClientId, mpsc::Receiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::channel(self.max_send_queue);
        let _ = self.clients.insert(id.clone(), tx);
        debug!(client_id = %id, peer = %peer, "client registered");
        (id, rx)
    }

    /// Remove a client by ID. Returns whether it was registered.
    pub fn unregister(&self, id: &ClientId) -> bool {
        self.clients.remove(id).is_some()
    }

    /// Queue a line for every client. Each failure is logged on its own.
    pub fn broadcast(&self, line: &str) -> BroadcastOutcome {
        let mut outcome = BroadcastOutcome::default();
        for entry in self.clients.iter() {
            outcome.attempted += 1;
            if try_enqueue(entry.key(), entry.value(), line.to_string()) {
                outcome.delivered += 1;
            }
        }
        outcome
    }

    /// Number of connected clients.
    pub fn count(&self) -> usize {
        self.clients.len()
    }

    pub fn clear(&self) {
        self.clients.clear();
    }
}

fn try_enqueue(id: &ClientId, tx: &mpsc::Sender<String>, line: String) -> bool {
    match tx.try_send(line) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(line)) => {
            warn!(client_id = %id, msg_len = line.len(), "send queue full, dropping message");
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => {
            debug!(client_id = %id, "send queue closed");
            false
        }
    }
}

/// Unregisters its client when dropped, including when the connection task
/// is torn down with its runtime.
pub(crate) struct Registration {
    registry: Arc<ClientRegistry>,
    id: ClientId,
}

impl Registration {
    pub(crate) fn new(registry: Arc<ClientRegistry>, id: ClientId) -> Self {
        Self { registry, id }
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.unregister(&self.id) {
            debug!(client_id = %self.id, "client unregistered");
        }
    }
}
