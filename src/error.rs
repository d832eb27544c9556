//! Error types for Taskrelay
//!
//! This module defines all custom error types used throughout the application.

use crate::session::SessionId;
use std::io;
use thiserror::Error;

/// Main error type for Taskrelay operations
#[derive(Error, Debug)]
pub enum TaskRelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Agent link protocol error
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Agent authentication error
    #[error("Authentication error: {0}")]
    Auth(String),

    /// SOCKS4 handshake error
    #[error("SOCKS4 error: {0}")]
    Socks4(#[from] Socks4Error),

    /// Session registry error
    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    /// Task queue error
    #[error("Task queue error: {0}")]
    TaskQueue(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// SOCKS4 handshake errors
///
/// Every variant ends the handshake with a rejection reply.
#[derive(Error, Debug)]
pub enum Socks4Error {
    /// Client closed the connection before sending a request
    #[error("Empty request")]
    EmptyRequest,

    /// Request shorter than the fixed header
    #[error("Truncated request: {0} bytes")]
    Truncated(usize),

    /// Unsupported SOCKS version
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// Command not supported
    #[error("Command not supported: {0}")]
    CommandNotSupported(u8),

    /// Missing or malformed SOCKS4a domain name
    #[error("Invalid domain name: {0}")]
    InvalidDomain(String),

    /// Name resolution failed
    #[error("Failed to resolve {domain}: {source}")]
    ResolutionFailed {
        /// Domain that was looked up
        domain: String,
        /// Underlying resolver error
        #[source]
        source: io::Error,
    },

    /// Name resolution returned no IPv4 address
    #[error("No IPv4 address found for domain: {0}")]
    NoIpv4Address(String),

    /// Unknown reply status byte
    #[error("Unknown reply code: {0:#04x}")]
    UnknownReplyCode(u8),

    /// IO error while reading the request
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Session registry errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    /// The id is already present in the registry
    #[error("Session already registered: {0}")]
    AlreadyRegistered(SessionId),
}

/// Reply codes for SOCKS4 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Socks4ReplyCode {
    /// Request granted
    Granted = 0x5A,
    /// Request rejected or failed
    Rejected = 0x5B,
}

impl From<Socks4ReplyCode> for u8 {
    fn from(code: Socks4ReplyCode) -> Self {
        code as u8
    }
}

impl TryFrom<u8> for Socks4ReplyCode {
    type Error = Socks4Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x5A => Ok(Socks4ReplyCode::Granted),
            0x5B => Ok(Socks4ReplyCode::Rejected),
            other => Err(Socks4Error::UnknownReplyCode(other)),
        }
    }
}

impl From<&Socks4Error> for Socks4ReplyCode {
    fn from(_: &Socks4Error) -> Self {
        // SOCKS4 has a single generic failure code for server-side rejections
        Socks4ReplyCode::Rejected
    }
}
