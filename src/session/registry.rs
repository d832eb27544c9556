//! Session registry
//!
//! Concurrent store of every live session, shared between the session pumps
//! and the tunnel delivery callbacks. Each entry holds the triple of socket
//! handle, inbound queue and connected flag, inserted and removed as one.

use super::SessionId;
use crate::error::RegistryError;
use bytes::Bytes;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{debug, trace};

/// Registry-side half of a session
#[derive(Debug)]
struct SessionEntry {
    /// Peer address of the accepted client socket
    peer: SocketAddr,
    /// Producer side of the inbound queue
    inbound_tx: mpsc::UnboundedSender<Bytes>,
    /// Destination-connected flag
    connected_tx: watch::Sender<bool>,
}

/// Pump-side half of a session
///
/// Returned by [`SessionRegistry::register`] and owned by the session pump.
/// Dropping it does not remove the registry entry; call
/// [`SessionRegistry::unregister`] for that.
#[derive(Debug)]
pub struct SessionHandle {
    id: SessionId,
    inbound_rx: mpsc::UnboundedReceiver<Bytes>,
    connected_rx: watch::Receiver<bool>,
}

impl SessionHandle {
    /// Id of the session
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Wait until the destination is reported connected
    ///
    /// Returns `false` if the session was unregistered before that happened.
    pub async fn wait_connected(&mut self) -> bool {
        self.connected_rx.wait_for(|connected| *connected).await.is_ok()
    }

    /// Current value of the connected flag
    pub fn is_connected(&self) -> bool {
        *self.connected_rx.borrow()
    }

    /// Wait for the next inbound chunk
    ///
    /// Returns `None` once the session is unregistered and the queue drained.
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.inbound_rx.recv().await
    }

    /// Take the next inbound chunk without waiting
    pub fn try_recv(&mut self) -> Option<Bytes> {
        self.inbound_rx.try_recv().ok()
    }
}

/// Concurrent registry of live sessions
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: DashMap<SessionId, SessionEntry>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a fresh session id
    ///
    /// Ids come from a monotonic counter and are never handed out twice.
    pub fn next_id(&self) -> SessionId {
        SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }

    /// Register a new session
    ///
    /// Inserts the socket handle, an empty inbound queue and a connected
    /// flag set to `false`, all under one map entry.
    pub fn register(
        &self,
        id: SessionId,
        peer: SocketAddr,
    ) -> Result<SessionHandle, RegistryError> {
        match self.sessions.entry(id) {
            Entry::Occupied(_) => Err(RegistryError::AlreadyRegistered(id)),
            Entry::Vacant(vacant) => {
                let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
                let (connected_tx, connected_rx) = watch::channel(false);
                vacant.insert(SessionEntry {
                    peer,
                    inbound_tx,
                    connected_tx,
                });
                debug!("Session {} registered for {}", id, peer);
                Ok(SessionHandle {
                    id,
                    inbound_rx,
                    connected_rx,
                })
            }
        }
    }

    /// Append a chunk to the inbound queue of a session
    ///
    /// Returns `false` if the session is unknown, which happens when the
    /// agent answers after the session was torn down.
    pub fn deliver(&self, id: SessionId, data: Bytes) -> bool {
        let Some(entry) = self.sessions.get(&id) else {
            trace!("Dropping {} bytes for unknown session {}", data.len(), id);
            return false;
        };

        let len = data.len();
        if entry.inbound_tx.send(data).is_err() {
            trace!("Session {} no longer consumes inbound data", id);
            return false;
        }

        trace!("Queued {} bytes for session {}", len, id);
        true
    }

    /// Mark the destination of a session as connected
    ///
    /// Returns `false` if the session is unknown.
    pub fn mark_connected(&self, id: SessionId) -> bool {
        match self.sessions.get(&id) {
            Some(entry) => {
                entry.connected_tx.send_replace(true);
                debug!("Session {} destination connected", id);
                true
            }
            None => {
                trace!("Connect ack for unknown session {}", id);
                false
            }
        }
    }

    /// Remove a session
    ///
    /// Idempotent: returns `true` only when an entry was actually removed.
    pub fn unregister(&self, id: SessionId) -> bool {
        let removed = self.sessions.remove(&id).is_some();
        if removed {
            debug!("Session {} unregistered", id);
        }
        removed
    }

    /// Check whether a session is registered
    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    /// Connected flag of a session, `None` if unknown
    pub fn is_connected(&self, id: SessionId) -> Option<bool> {
        self.sessions
            .get(&id)
            .map(|entry| *entry.connected_tx.borrow())
    }

    /// Peer address of a session, `None` if unknown
    pub fn peer_addr(&self, id: SessionId) -> Option<SocketAddr> {
        self.sessions.get(&id).map(|entry| entry.peer)
    }

    /// Ids of all live sessions
    pub fn session_ids(&self) -> Vec<SessionId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// Check if there are no live sessions
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
