//! Session module for Taskrelay
//!
//! A session is one local SOCKS client bridged to one remote destination
//! through the agent. The registry holds the shared per-session state and
//! the pump drives the client socket.

mod pump;
mod registry;

pub use pump::{PumpConfig, PumpExit, SessionPump};
pub use registry::{SessionHandle, SessionRegistry};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque session identifier
///
/// Used as the correlation key for every work item and notification
/// exchanged with the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(u64);

impl SessionId {
    /// Raw numeric value
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for SessionId {
    fn from(value: u64) -> Self {
        SessionId(value)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
