//! Tunnel adapter
//!
//! The tunnel is the only bridge between local session events and the
//! agent. Sessions call [`Tunnel::emit_connect`] and [`Tunnel::emit_send`];
//! whatever talks to the agent calls [`Tunnel::on_connect_ack`] and
//! [`Tunnel::on_inbound_delivery`] (or [`Tunnel::handle_notification`]).

mod queue;
mod types;

pub use queue::{ChannelTaskQueue, TaskQueue};
pub use types::{Notification, WorkItem};

use crate::error::TaskRelayError;
use crate::session::{SessionId, SessionRegistry};
use bytes::Bytes;
use std::net::Ipv4Addr;
use std::sync::Arc;
use tracing::{debug, trace};

/// Translation layer between sessions and the task queue
#[derive(Debug, Clone)]
pub struct Tunnel {
    registry: Arc<SessionRegistry>,
    queue: Arc<dyn TaskQueue>,
}

impl Tunnel {
    /// Create a tunnel over a registry and a task queue
    pub fn new(registry: Arc<SessionRegistry>, queue: Arc<dyn TaskQueue>) -> Self {
        Tunnel { registry, queue }
    }

    /// The registry the tunnel delivers into
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Ask the agent to open an outbound connection
    ///
    /// Completion is reported later through [`Tunnel::on_connect_ack`].
    pub async fn emit_connect(
        &self,
        session_id: SessionId,
        address: Ipv4Addr,
        port: u16,
    ) -> Result<(), TaskRelayError> {
        debug!("Session {} requesting connect to {}:{}", session_id, address, port);
        self.queue
            .submit(WorkItem::Connect {
                session_id,
                address,
                port,
            })
            .await
    }

    /// Ask the agent to forward client bytes to the destination
    pub async fn emit_send(
        &self,
        session_id: SessionId,
        payload: Bytes,
    ) -> Result<(), TaskRelayError> {
        trace!("Session {} sending {} bytes", session_id, payload.len());
        self.queue
            .submit(WorkItem::Send {
                session_id,
                payload,
            })
            .await
    }

    /// Bytes received by the agent from the destination
    ///
    /// Unknown sessions are ignored; returns whether the bytes were queued.
    pub fn on_inbound_delivery(&self, session_id: SessionId, payload: Bytes) -> bool {
        self.registry.deliver(session_id, payload)
    }

    /// The agent connected the destination of a session
    ///
    /// Unknown sessions are ignored; returns whether the flag was set.
    pub fn on_connect_ack(&self, session_id: SessionId) -> bool {
        self.registry.mark_connected(session_id)
    }

    /// Dispatch a decoded agent notification
    pub fn handle_notification(&self, notification: Notification) -> bool {
        match notification {
            Notification::ConnectAck { session_id } => self.on_connect_ack(session_id),
            Notification::Deliver {
                session_id,
                payload,
            } => self.on_inbound_delivery(session_id, payload),
        }
    }
}
