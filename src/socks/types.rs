//! SOCKS4 type definitions
//!
//! Defines the core types used in SOCKS4/4a protocol handling.

use super::consts::*;
use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};

/// SOCKS4 command types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Socks4Command {
    /// CONNECT - establish a TCP stream to the destination
    StreamConnect,
    /// BIND - wait for an inbound connection (not supported)
    PortBind,
}

impl Socks4Command {
    /// Parse a command byte into Socks4Command
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            SOCKS4_CMD_CONNECT => Some(Socks4Command::StreamConnect),
            SOCKS4_CMD_BIND => Some(Socks4Command::PortBind),
            _ => None,
        }
    }
}

impl fmt::Display for Socks4Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Socks4Command::StreamConnect => write!(f, "CONNECT"),
            Socks4Command::PortBind => write!(f, "BIND"),
        }
    }
}

/// A validated SOCKS4 CONNECT request
///
/// For SOCKS4a requests the destination holds the first IPv4 address the
/// domain resolved to, and `domain` keeps the name the client asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Socks4Request {
    command: Socks4Command,
    destination: SocketAddrV4,
    user_id: String,
    domain: Option<String>,
}

impl Socks4Request {
    /// Create a new request
    pub fn new(
        command: Socks4Command,
        destination: SocketAddrV4,
        user_id: String,
        domain: Option<String>,
    ) -> Self {
        Socks4Request {
            command,
            destination,
            user_id,
            domain,
        }
    }

    /// The requested command
    pub fn command(&self) -> Socks4Command {
        self.command
    }

    /// Destination address and port
    pub fn destination(&self) -> SocketAddrV4 {
        self.destination
    }

    /// Destination IPv4 address
    pub fn destination_address(&self) -> Ipv4Addr {
        *self.destination.ip()
    }

    /// Destination port
    pub fn destination_port(&self) -> u16 {
        self.destination.port()
    }

    /// User id sent by the client (may be empty)
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// SOCKS4a domain name, if the request used one
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref()
    }
}

impl fmt::Display for Socks4Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.domain {
            Some(domain) => write!(
                f,
                "{} {}:{} ({})",
                self.command,
                domain,
                self.destination.port(),
                self.destination.ip()
            ),
            None => write!(f, "{} {}", self.command, self.destination),
        }
    }
}

/// Check whether an address is in the SOCKS4a marker range
///
/// Matches every address that renders with the `0.0.0.` prefix, which
/// includes `0.0.0.0`.
pub fn is_socks4a_marker(addr: &Ipv4Addr) -> bool {
    addr.to_string().starts_with(SOCKS4A_ADDR_PREFIX)
}
