//! Agent link message definitions

use crate::tunnel::WorkItem;
use serde::{Deserialize, Serialize};

/// Hash width in bytes (SHA-256 produces 32 bytes)
pub const HASH_WIDTH_IN_BYTES: usize = 32;

/// Protocol version type
type ProtocolVersion = u8;

const PROTO_V1: u8 = 1u8;

/// Current agent link protocol version
pub const CURRENT_PROTO_VERSION: ProtocolVersion = PROTO_V1;

/// Digest type (32-byte SHA-256 hash)
pub type Digest = [u8; HASH_WIDTH_IN_BYTES];

/// First message on a new agent connection
///
/// Sent by the proxy; carries the nonce the agent must sign with its token.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Hello {
    /// Protocol version spoken by the proxy
    pub version: ProtocolVersion,
    /// Random challenge for this connection
    pub nonce: Digest,
}

impl Hello {
    /// Create a hello for the current protocol version
    pub fn new(nonce: Digest) -> Self {
        Hello {
            version: CURRENT_PROTO_VERSION,
            nonce,
        }
    }
}

/// Authentication message
///
/// Sent by the agent after receiving the proxy's nonce.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct Auth(pub Digest);

impl Auth {
    /// Create a new auth message from token and nonce
    pub fn new(token: &str, nonce: &Digest) -> Self {
        let mut concat = Vec::from(token.as_bytes());
        concat.extend_from_slice(nonce);
        Auth(super::digest::digest(&concat))
    }
}

/// Acknowledgment message
///
/// Sent by the proxy in response to authentication.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum Ack {
    /// Authentication successful
    Ok,
    /// Authentication failed (wrong token)
    AuthFailed,
}

impl std::fmt::Display for Ack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Ack::Ok => "Ok",
                Ack::AuthFailed => "Incorrect token",
            }
        )
    }
}

/// Frames sent from the proxy to the agent after authentication
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub enum ServerFrame {
    /// A queued work item
    Work(WorkItem),
    /// Keepalive
    HeartBeat,
}
