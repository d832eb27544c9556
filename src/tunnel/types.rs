//! Work item and notification types
//!
//! These are the only messages exchanged with the agent. They are
//! serialized with bincode on the agent link.

use crate::session::SessionId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// A unit of work submitted to the agent
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum WorkItem {
    /// Open an outbound connection for a session
    Connect {
        /// Session the connection belongs to
        session_id: SessionId,
        /// Destination address
        address: Ipv4Addr,
        /// Destination port
        port: u16,
    },
    /// Forward client bytes to the connected destination
    Send {
        /// Session the bytes belong to
        session_id: SessionId,
        /// Bytes read from the client
        payload: Bytes,
    },
}

impl WorkItem {
    /// Label of the work item ("connect" or "send")
    pub fn label(&self) -> &'static str {
        match self {
            WorkItem::Connect { .. } => "connect",
            WorkItem::Send { .. } => "send",
        }
    }

    /// Session the work item belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            WorkItem::Connect { session_id, .. } | WorkItem::Send { session_id, .. } => {
                *session_id
            }
        }
    }
}

impl fmt::Display for WorkItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkItem::Connect {
                session_id,
                address,
                port,
            } => write!(f, "connect[{}] {}:{}", session_id, address, port),
            WorkItem::Send {
                session_id,
                payload,
            } => write!(f, "send[{}] {} bytes", session_id, payload.len()),
        }
    }
}

/// A notification reported back by the agent
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// The outbound connection of a session is live
    ConnectAck {
        /// Session whose destination connected
        session_id: SessionId,
    },
    /// Bytes received from the destination of a session
    Deliver {
        /// Session the bytes belong to
        session_id: SessionId,
        /// Bytes to relay to the client
        payload: Bytes,
    },
}

impl Notification {
    /// Session the notification belongs to
    pub fn session_id(&self) -> SessionId {
        match self {
            Notification::ConnectAck { session_id } | Notification::Deliver { session_id, .. } => {
                *session_id
            }
        }
    }
}
