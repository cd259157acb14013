use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Connection handle of one game-client channel.
pub type PeerId = u64;

/// Set of live game-client channels.
///
/// Membership is driven by connection lifecycle only: a peer enters on
/// accept and leaves through its close event. Send-time failures skip
/// the peer but never prune it.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    peers: Mutex<HashMap<PeerId, mpsc::UnboundedSender<String>>>,
    next_id: AtomicU64,
}

impl BroadcastHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new peer and returns its id plus the outbound frame
    /// stream the connection task should drain.
    pub fn add_peer(&self) -> (PeerId, mpsc::UnboundedReceiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(id, tx);
        debug!(peer = id, "game client joined broadcast set");
        (id, rx)
    }

    /// Removes a peer. Idempotent; called from the close event.
    pub fn remove_peer(&self, id: PeerId) -> bool {
        let removed = self
            .peers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&id)
            .is_some();
        if removed {
            debug!(peer = id, "game client left broadcast set");
        }
        removed
    }

    pub fn len(&self) -> usize {
        self.peers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serializes `message` once and writes it to every open peer.
    /// Closed peers are skipped; they leave the set only via their own
    /// close event. Returns the number of peers written to.
    pub fn broadcast(&self, message: &Value) -> usize {
        let frame = message.to_string();
        let peers = self.peers.lock().unwrap_or_else(|e| e.into_inner());
        let mut sent = 0;
        for (id, tx) in peers.iter() {
            if tx.is_closed() {
                trace!(peer = id, "skipping closed peer");
                continue;
            }
            if tx.send(frame.clone()).is_ok() {
                sent += 1;
            }
        }
        trace!(sent, "broadcast to game clients");
        sent
    }
}
