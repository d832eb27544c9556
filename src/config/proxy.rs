//! SOCKS listener configuration
//!
//! Defines the `[proxy]` section of the configuration file.

use crate::helper::{DEFAULT_BACKLOG, DEFAULT_BUFFER_SIZE};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Default bind address (all interfaces)
fn default_bind_addr() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

/// Default SOCKS port
fn default_bind_port() -> u16 {
    1080
}

fn default_backlog() -> u32 {
    DEFAULT_BACKLOG
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_SIZE
}

/// SOCKS4 listener configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProxyConfig {
    /// Address to bind the SOCKS listener to
    #[serde(default = "default_bind_addr")]
    pub bind_addr: IpAddr,

    /// Port to bind the SOCKS listener to
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Listen backlog
    #[serde(default = "default_backlog")]
    pub backlog: u32,

    /// Send and receive buffer size applied to accepted sockets
    #[serde(default = "default_buffer_size")]
    pub socket_buffer_size: usize,

    /// Size of a single socket read (handshake and relay)
    #[serde(default = "default_buffer_size")]
    pub read_chunk_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            bind_port: default_bind_port(),
            backlog: default_backlog(),
            socket_buffer_size: default_buffer_size(),
            read_chunk_size: default_buffer_size(),
        }
    }
}

impl ProxyConfig {
    /// Socket address the listener binds to
    pub fn bind_socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_addr, self.bind_port)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.backlog == 0 {
            return Err("backlog must be greater than zero".to_string());
        }
        if self.socket_buffer_size == 0 {
            return Err("socket_buffer_size must be greater than zero".to_string());
        }
        if self.read_chunk_size == 0 {
            return Err("read_chunk_size must be greater than zero".to_string());
        }
        Ok(())
    }
}
