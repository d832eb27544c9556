//! SOCKS4 listener
//!
//! Accepts local clients, runs the SOCKS4 handshake and hands every
//! accepted request to its own session task.

use crate::agent::AgentLink;
use crate::config::{Config, ProxyConfig};
use crate::error::TaskRelayError;
use crate::helper::{create_listener, set_socket_buffers};
use crate::session::{PumpConfig, SessionPump, SessionRegistry};
use crate::socks::handshake;
use crate::tunnel::{ChannelTaskQueue, Tunnel};
use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Run the proxy with the given configuration
///
/// Starts the agent link and the SOCKS listener. Returns when the listener
/// stops, either because `cancel` fired or because accepting failed.
pub async fn run_proxy(config: Config, cancel: CancellationToken) -> Result<()> {
    let cancel = cancel.child_token();
    let registry = Arc::new(SessionRegistry::new());
    let (queue, work_rx) = ChannelTaskQueue::new();
    let tunnel = Tunnel::new(registry, Arc::new(queue));

    let agent_listener = AgentLink::bind(&config.agent)?;
    let agent = AgentLink::new(config.agent, tunnel.clone(), work_rx, cancel.clone());
    let agent_task = tokio::spawn(agent.run(agent_listener));

    let result = ProxyServer::new(config.proxy, tunnel, cancel.clone())
        .run()
        .await;

    cancel.cancel();
    match agent_task.await {
        Ok(Err(e)) => warn!("Agent link failed: {:#}", e),
        Err(e) => warn!("Agent link task panicked: {}", e),
        Ok(Ok(())) => {}
    }

    result
}

/// Accept loop of the SOCKS4 proxy
pub struct ProxyServer {
    config: ProxyConfig,
    tunnel: Tunnel,
    cancel: CancellationToken,
}

impl ProxyServer {
    /// Create a new proxy server
    pub fn new(config: ProxyConfig, tunnel: Tunnel, cancel: CancellationToken) -> Self {
        ProxyServer {
            config,
            tunnel,
            cancel,
        }
    }

    /// Bind the listening socket with the configured backlog
    pub fn bind(&self) -> Result<TcpListener> {
        let addr = self.config.bind_socket_addr();
        create_listener(addr, self.config.backlog)
            .with_context(|| format!("Failed to start SOCKS listener on {}", addr))
    }

    /// Bind and accept until cancelled or the listener fails
    pub async fn run(self) -> Result<()> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accept on an already bound listener
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        info!("SOCKS4 proxy listening on {}", listener.local_addr()?);

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("SOCKS4 proxy shutting down");
                    return Ok(());
                }
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    error!("SOCKS4 listener failed: {}", e);
                    return Err(e).context("Failed to accept SOCKS client");
                }
            };

            debug!("Accepted SOCKS client {}", peer);
            if let Err(e) = set_socket_buffers(&stream, self.config.socket_buffer_size) {
                warn!("Failed to set socket buffers for {}: {}", peer, e);
            }

            let tunnel = self.tunnel.clone();
            let cancel = self.cancel.clone();
            let chunk_size = self.config.read_chunk_size;
            tokio::spawn(async move {
                if let Err(e) = handle_client(stream, peer, tunnel, chunk_size, cancel).await {
                    debug!("SOCKS client {} dropped: {}", peer, e);
                }
            });
        }
    }
}

/// Run one client from handshake to session teardown
async fn handle_client(
    mut stream: TcpStream,
    peer: SocketAddr,
    tunnel: Tunnel,
    chunk_size: usize,
    cancel: CancellationToken,
) -> Result<(), TaskRelayError> {
    let request = tokio::select! {
        _ = cancel.cancelled() => return Ok(()),
        request = handshake(&mut stream, chunk_size) => request?,
    };

    let registry = tunnel.registry();
    let id = registry.next_id();
    let handle = registry.register(id, peer)?;
    info!("Session {} from {}: {}", id, peer, request);

    if let Err(e) = tunnel
        .emit_connect(id, request.destination_address(), request.destination_port())
        .await
    {
        registry.unregister(id);
        return Err(e);
    }

    let config = PumpConfig {
        read_chunk_size: chunk_size,
    };
    SessionPump::new(stream, handle, tunnel, config, cancel)
        .run()
        .await;
    Ok(())
}
