//! Helper utilities for Taskrelay
//!
//! This module provides socket setup helpers shared by the SOCKS listener
//! and the agent link.

use anyhow::{Context, Result};
use socket2::{Domain, Protocol, SockRef, Socket, Type};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};

/// Default buffer size for socket buffers and relay reads
pub const DEFAULT_BUFFER_SIZE: usize = 131070;

/// Default listen backlog
pub const DEFAULT_BACKLOG: u32 = 500;

/// Default agent heartbeat interval in seconds
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 30;

/// Bind a TCP listener with an explicit backlog
///
/// Uses socket2 so the backlog and SO_REUSEADDR can be set before listening.
pub fn create_listener(addr: SocketAddr, backlog: u32) -> Result<TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .context("Failed to create socket")?;

    socket
        .set_reuse_address(true)
        .context("Failed to set SO_REUSEADDR")?;
    socket
        .set_nonblocking(true)
        .context("Failed to set non-blocking")?;
    socket
        .bind(&addr.into())
        .with_context(|| format!("Failed to bind to {}", addr))?;

    let backlog = i32::try_from(backlog).unwrap_or(i32::MAX);
    socket
        .listen(backlog)
        .with_context(|| format!("Failed to listen on {}", addr))?;

    TcpListener::from_std(socket.into()).context("Failed to create TcpListener")
}

/// Set both socket buffer sizes of an accepted connection
pub fn set_socket_buffers(stream: &TcpStream, size: usize) -> std::io::Result<()> {
    let socket = SockRef::from(stream);
    socket.set_recv_buffer_size(size)?;
    socket.set_send_buffer_size(size)?;
    Ok(())
}

/// Parse duration from seconds
pub fn duration_from_secs(secs: u64) -> Duration {
    Duration::from_secs(secs)
}
