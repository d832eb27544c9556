//! Agent link
//!
//! The remote agent dials in to the proxy, proves it knows the shared token
//! and then receives every queued [`WorkItem`] as a frame. Notifications the
//! agent sends back are fed into the [`Tunnel`].
//!
//! One agent is served at a time. Work items queued while no agent is
//! connected stay in the queue until the next agent authenticates.

use crate::config::AgentConfig;
use crate::error::TaskRelayError;
use crate::helper::{create_listener, duration_from_secs, DEFAULT_BACKLOG};
use crate::protocol::{
    read_auth, read_frame, write_ack, write_frame, write_hello, Ack, Auth, Digest, Hello,
    ServerFrame,
};
use crate::tunnel::{Notification, Tunnel, WorkItem};
use anyhow::{Context, Result};
use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Time an agent has to complete the handshake
const AUTH_TIMEOUT: Duration = Duration::from_secs(10);

/// Pause after a failed accept
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Why serving a single agent connection ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkExit {
    /// The agent closed the connection
    AgentClosed,
    /// Every task queue sender is gone
    QueueClosed,
    /// Shutdown was requested
    Shutdown,
}

impl fmt::Display for LinkExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LinkExit::AgentClosed => "agent closed",
            LinkExit::QueueClosed => "queue closed",
            LinkExit::Shutdown => "shutdown",
        };
        write!(f, "{}", s)
    }
}

/// Server side of the agent link
pub struct AgentLink {
    config: AgentConfig,
    tunnel: Tunnel,
    work_rx: mpsc::UnboundedReceiver<WorkItem>,
    /// Item taken off the queue whose write failed
    pending: Option<WorkItem>,
    cancel: CancellationToken,
}

impl AgentLink {
    /// Create an agent link draining `work_rx`
    pub fn new(
        config: AgentConfig,
        tunnel: Tunnel,
        work_rx: mpsc::UnboundedReceiver<WorkItem>,
        cancel: CancellationToken,
    ) -> Self {
        AgentLink {
            config,
            tunnel,
            work_rx,
            pending: None,
            cancel,
        }
    }

    /// Bind the agent listener from the configured address
    pub fn bind(config: &AgentConfig) -> Result<TcpListener> {
        let addr: SocketAddr = config
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid agent bind address: {}", config.bind_addr))?;
        create_listener(addr, DEFAULT_BACKLOG)
    }

    /// Accept agents one after another until shutdown
    pub async fn run(mut self, listener: TcpListener) -> Result<()> {
        let local_addr = listener.local_addr()?;
        info!("Agent link listening on {}", local_addr);

        loop {
            let accepted = tokio::select! {
                _ = self.cancel.cancelled() => break,
                accepted = listener.accept() => accepted,
            };

            let (stream, peer) = match accepted {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Failed to accept agent connection: {}", e);
                    if !wait_before_retry(&self.cancel).await {
                        break;
                    }
                    continue;
                }
            };

            info!("Agent connected from {}", peer);
            configure_agent_stream(&stream, peer);

            match self.serve(stream).await {
                Ok(LinkExit::AgentClosed) => info!("Agent {} disconnected", peer),
                Ok(exit) => {
                    info!("Agent link stopped: {}", exit);
                    break;
                }
                Err(e) => warn!("Agent {} dropped: {}", peer, e),
            }
        }

        info!("Agent link stopped");
        Ok(())
    }

    /// Serve a single agent connection
    async fn serve<S>(&mut self, conn: S) -> Result<LinkExit, TaskRelayError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send,
    {
        let cancel = self.cancel.clone();
        let (mut reader, mut writer) = tokio::io::split(conn);

        let authenticated = tokio::select! {
            _ = cancel.cancelled() => return Ok(LinkExit::Shutdown),
            res = time::timeout(AUTH_TIMEOUT, self.authenticate(&mut reader, &mut writer)) => res,
        };
        authenticated
            .map_err(|_| TaskRelayError::Auth("Agent handshake timed out".to_string()))??;

        info!("Agent authenticated");

        let tunnel = self.tunnel.clone();
        tokio::select! {
            _ = cancel.cancelled() => Ok(LinkExit::Shutdown),
            res = read_notifications(&mut reader, tunnel) => res.map(|_| LinkExit::AgentClosed),
            res = self.forward_work(&mut writer) => res,
        }
    }

    /// Challenge the agent with a fresh nonce and check its answer
    async fn authenticate<R, W>(&self, reader: &mut R, writer: &mut W) -> Result<(), TaskRelayError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let nonce: Digest = rand::random();
        write_hello(writer, &Hello::new(nonce)).await?;
        debug!("Sent agent hello");

        let auth = read_auth(reader).await?;
        if auth != Auth::new(&self.config.token, &nonce) {
            write_ack(writer, &Ack::AuthFailed).await?;
            return Err(TaskRelayError::Auth("Agent sent an incorrect token".to_string()));
        }

        write_ack(writer, &Ack::Ok).await
    }

    /// Write queued work items and heartbeats until the queue or the link closes
    async fn forward_work<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
    ) -> Result<LinkExit, TaskRelayError> {
        if let Some(item) = self.pending.take() {
            self.write_work(writer, item).await?;
        }

        let period = duration_from_secs(self.config.heartbeat_interval);
        let mut heartbeat = time::interval_at(Instant::now() + period, period);

        loop {
            tokio::select! {
                item = self.work_rx.recv() => match item {
                    Some(item) => self.write_work(writer, item).await?,
                    None => return Ok(LinkExit::QueueClosed),
                },
                _ = heartbeat.tick() => {
                    trace!("Sending heartbeat");
                    write_frame(writer, &ServerFrame::HeartBeat).await?;
                }
            }
        }
    }

    async fn write_work<W: AsyncWrite + Unpin>(
        &mut self,
        writer: &mut W,
        item: WorkItem,
    ) -> Result<(), TaskRelayError> {
        trace!("Forwarding {}", item);
        let frame = ServerFrame::Work(item);
        if let Err(e) = write_frame(writer, &frame).await {
            if let ServerFrame::Work(item) = frame {
                self.pending = Some(item);
            }
            return Err(e);
        }
        Ok(())
    }
}

/// Sleep for [`ACCEPT_RETRY_DELAY`]; `false` if shutdown fired meanwhile
async fn wait_before_retry(cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = time::sleep(ACCEPT_RETRY_DELAY) => true,
    }
}

/// Disable Nagle on the agent connection
fn configure_agent_stream(stream: &TcpStream, peer: SocketAddr) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for agent {}: {}", peer, e);
    }
}

/// Feed agent notifications into the tunnel until the agent closes the link
async fn read_notifications<R: AsyncRead + Unpin>(
    reader: &mut R,
    tunnel: Tunnel,
) -> Result<(), TaskRelayError> {
    while let Some(notification) = read_frame::<Notification, _>(reader).await? {
        let session_id = notification.session_id();
        if !tunnel.handle_notification(notification) {
            debug!("Dropping notification for unknown session {}", session_id);
        }
    }
    Ok(())
}
