//! Per-room subscriber hub
//!
//! Every connection registers one unbounded sender; a single writer task per
//! connection drains it, so messages arrive in the order they were sent.
//! Subscribe and publish share one lock, which keeps a late joiner's initial
//! snapshot from being older than any frame it later receives.

use std::collections::HashMap;

use tokio::sync::{mpsc, RwLock};

use crate::protocol::{ServerMessage, SnapshotMessage};

pub type ConnectionId = u64;
pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

#[derive(Debug, Default)]
struct HubState {
    senders: HashMap<ConnectionId, Outbox>,
    latest: Option<SnapshotMessage>,
}

#[derive(Debug, Default)]
pub struct Subscribers {
    inner: RwLock<HubState>,
}

impl Subscribers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn` and hand it the latest snapshot, if any
    ///
    /// Re-subscribing replaces the previous sender.
    pub async fn subscribe(&self, conn: ConnectionId, tx: Outbox) {
        let mut hub = self.inner.write().await;
        if let Some(latest) = hub.latest.clone() {
            let _ = tx.send(ServerMessage::Snapshot(latest));
        }
        hub.senders.insert(conn, tx);
    }

    pub async fn unsubscribe(&self, conn: ConnectionId) -> bool {
        self.inner.write().await.senders.remove(&conn).is_some()
    }

    /// Send `snapshot` to every subscriber and remember it as the latest
    ///
    /// Subscribers whose connection is gone are dropped. Returns how many
    /// received the message.
    pub async fn publish(&self, snapshot: SnapshotMessage) -> usize {
        let mut hub = self.inner.write().await;
        let message = ServerMessage::Snapshot(snapshot.clone());
        hub.senders.retain(|_, tx| tx.send(message.clone()).is_ok());
        hub.latest = Some(snapshot);
        hub.senders.len()
    }

    /// Send a message to one subscriber only
    pub async fn deliver_to(&self, conn: ConnectionId, message: ServerMessage) -> bool {
        let hub = self.inner.read().await;
        match hub.senders.get(&conn) {
            Some(tx) => tx.send(message).is_ok(),
            None => false,
        }
    }

    pub async fn latest(&self) -> Option<SnapshotMessage> {
        self.inner.read().await.latest.clone()
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.senders.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
