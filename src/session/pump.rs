//! Session pump
//!
//! Drives one client socket through `AwaitingConnect -> Relaying ->
//! Terminated`. The pump is the only owner of the socket; it learns about
//! the agent side exclusively through its [`SessionHandle`].

use super::registry::SessionHandle;
use super::SessionId;
use crate::tunnel::Tunnel;
use bytes::{Bytes, BytesMut};
use std::fmt;
use std::io;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

/// Tunables of a session pump
#[derive(Debug, Clone)]
pub struct PumpConfig {
    /// Size of a single socket read while relaying
    pub read_chunk_size: usize,
}

impl Default for PumpConfig {
    fn default() -> Self {
        PumpConfig {
            read_chunk_size: crate::helper::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// Why a session pump stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    /// The process-wide cancellation fired
    Shutdown,
    /// The session disappeared from the registry
    SessionClosed,
    /// The client socket became unusable
    SocketError,
    /// Work items can no longer be submitted
    QueueClosed,
}

impl fmt::Display for PumpExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            PumpExit::Shutdown => "shutdown",
            PumpExit::SessionClosed => "session closed",
            PumpExit::SocketError => "socket error",
            PumpExit::QueueClosed => "task queue closed",
        };
        write!(f, "{}", reason)
    }
}

enum RelayEvent {
    Shutdown,
    Readable(io::Result<()>),
    Inbound(Option<Bytes>),
}

enum ReadOutcome {
    Data(Bytes),
    Closed,
    Nothing,
}

/// Per-session relay loop
pub struct SessionPump {
    stream: TcpStream,
    handle: SessionHandle,
    tunnel: Tunnel,
    cancel: CancellationToken,
    read_buf: Vec<u8>,
}

impl SessionPump {
    /// Create a pump for a registered session
    pub fn new(
        stream: TcpStream,
        handle: SessionHandle,
        tunnel: Tunnel,
        config: PumpConfig,
        cancel: CancellationToken,
    ) -> Self {
        SessionPump {
            stream,
            handle,
            tunnel,
            cancel,
            read_buf: vec![0u8; config.read_chunk_size.max(1)],
        }
    }

    /// Id of the session being pumped
    pub fn id(&self) -> SessionId {
        self.handle.id()
    }

    /// Run the session to completion
    ///
    /// The registry entry is removed and the socket closed before returning.
    pub async fn run(mut self) -> PumpExit {
        let id = self.id();

        let exit = match self.await_connect().await {
            Some(exit) => exit,
            None => {
                debug!("Session {} relaying", id);
                self.relay().await
            }
        };

        self.tunnel.registry().unregister(id);
        info!("Session {} terminated ({})", id, exit);
        exit
    }

    /// Wait for the agent to confirm the outbound connection
    ///
    /// The client socket is left untouched in this state. Returns an exit
    /// reason if the session ends before the destination connects.
    async fn await_connect(&mut self) -> Option<PumpExit> {
        debug!("Session {} awaiting connect", self.id());

        tokio::select! {
            _ = self.cancel.cancelled() => Some(PumpExit::Shutdown),
            connected = self.handle.wait_connected() => {
                if connected {
                    None
                } else {
                    Some(PumpExit::SessionClosed)
                }
            }
        }
    }

    /// Relay in both directions
    ///
    /// EOF from the client only stops the outbound direction; inbound chunks
    /// keep flowing until the session closes, a write fails or shutdown.
    async fn relay(&mut self) -> PumpExit {
        let id = self.id();
        let mut read_closed = false;

        loop {
            let event = tokio::select! {
                _ = self.cancel.cancelled() => RelayEvent::Shutdown,
                ready = self.stream.readable(), if !read_closed => RelayEvent::Readable(ready),
                chunk = self.handle.recv() => RelayEvent::Inbound(chunk),
            };

            match event {
                RelayEvent::Shutdown => return PumpExit::Shutdown,
                RelayEvent::Readable(Err(e)) => {
                    if is_fatal(&e) {
                        debug!("Session {} socket unusable: {}", id, e);
                        return PumpExit::SocketError;
                    }
                    warn!("Session {} readiness error: {}", id, e);
                }
                RelayEvent::Readable(Ok(())) => {
                    match drain_available(&self.stream, &mut self.read_buf) {
                        Ok(ReadOutcome::Data(payload)) => {
                            if let Err(e) = self.tunnel.emit_send(id, payload).await {
                                warn!("Session {} failed to submit send: {}", id, e);
                                return PumpExit::QueueClosed;
                            }
                        }
                        Ok(ReadOutcome::Closed) => {
                            debug!("Session {} client finished sending", id);
                            read_closed = true;
                        }
                        Ok(ReadOutcome::Nothing) => {}
                        Err(e) if is_fatal(&e) => {
                            debug!("Session {} read failed: {}", id, e);
                            return PumpExit::SocketError;
                        }
                        Err(e) => warn!("Session {} read error: {}", id, e),
                    }
                }
                RelayEvent::Inbound(None) => return PumpExit::SessionClosed,
                RelayEvent::Inbound(Some(chunk)) => {
                    let result = tokio::select! {
                        _ = self.cancel.cancelled() => return PumpExit::Shutdown,
                        result = self.stream.write_all(&chunk) => result,
                    };

                    match result {
                        Ok(()) => trace!("Session {} wrote {} bytes to client", id, chunk.len()),
                        Err(e) if is_fatal(&e) => {
                            debug!("Session {} write failed: {}", id, e);
                            return PumpExit::SocketError;
                        }
                        Err(e) => warn!("Session {} dropped {} bytes: {}", id, chunk.len(), e),
                    }
                }
            }
        }
    }
}

/// Read everything the socket has ready without blocking
///
/// Keeps reading while reads fill the whole buffer, so one client write
/// becomes one work item where possible.
fn drain_available(stream: &TcpStream, buf: &mut [u8]) -> io::Result<ReadOutcome> {
    let mut data = BytesMut::new();

    loop {
        match stream.try_read(buf) {
            Ok(0) => {
                if data.is_empty() {
                    return Ok(ReadOutcome::Closed);
                }
                break;
            }
            Ok(n) => {
                data.extend_from_slice(&buf[..n]);
                if n < buf.len() {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
            Err(e) => {
                if data.is_empty() {
                    return Err(e);
                }
                break;
            }
        }
    }

    if data.is_empty() {
        Ok(ReadOutcome::Nothing)
    } else {
        Ok(ReadOutcome::Data(data.freeze()))
    }
}

/// Errors after which the client socket cannot be used again
fn is_fatal(error: &io::Error) -> bool {
    matches!(
        error.kind(),
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected
            | io::ErrorKind::UnexpectedEof
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionRegistry;
    use crate::tunnel::{ChannelTaskQueue, WorkItem};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    async fn create_tcp_stream_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (client, accepted) = tokio::join!(TcpStream::connect(addr), listener.accept());
        (client.unwrap(), accepted.unwrap().0)
    }

    struct Harness {
        client: TcpStream,
        tunnel: Tunnel,
        work_rx: mpsc::UnboundedReceiver<WorkItem>,
        cancel: CancellationToken,
        id: SessionId,
        pump: JoinHandle<PumpExit>,
    }

    async fn start_pump() -> Harness {
        let registry = Arc::new(SessionRegistry::new());
        let (queue, work_rx) = ChannelTaskQueue::new();
        let tunnel = Tunnel::new(Arc::clone(&registry), Arc::new(queue));
        let cancel = CancellationToken::new();

        let (client, server) = create_tcp_stream_pair().await;
        let id = registry.next_id();
        let handle = registry
            .register(id, server.peer_addr().unwrap())
            .unwrap();

        let pump = SessionPump::new(
            server,
            handle,
            tunnel.clone(),
            PumpConfig::default(),
            cancel.clone(),
        );
        let pump = tokio::spawn(pump.run());

        Harness {
            client,
            tunnel,
            work_rx,
            cancel,
            id,
            pump,
        }
    }

    async fn next_item(rx: &mut mpsc::UnboundedReceiver<WorkItem>) -> WorkItem {
        tokio::time::timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("timed out waiting for work item")
            .expect("queue closed")
    }

    #[test]
    fn test_is_fatal() {
        assert!(is_fatal(&io::Error::from(io::ErrorKind::BrokenPipe)));
        assert!(is_fatal(&io::Error::from(io::ErrorKind::ConnectionReset)));
        assert!(!is_fatal(&io::Error::from(io::ErrorKind::Interrupted)));
        assert!(!is_fatal(&io::Error::from(io::ErrorKind::Other)));
    }

    #[test]
    fn test_pump_exit_display() {
        assert_eq!(format!("{}", PumpExit::Shutdown), "shutdown");
        assert_eq!(format!("{}", PumpExit::SocketError), "socket error");
    }

    #[tokio::test]
    async fn test_no_relay_before_connect_ack() {
        let mut h = start_pump().await;

        h.client.write_all(b"early").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(h.work_rx.try_recv().is_err());

        h.tunnel.on_connect_ack(h.id);

        assert_eq!(
            next_item(&mut h.work_rx).await,
            WorkItem::Send {
                session_id: h.id,
                payload: Bytes::from_static(b"early"),
            }
        );
        h.cancel.cancel();
    }

    #[tokio::test]
    async fn test_relays_both_directions() {
        let mut h = start_pump().await;
        h.tunnel.on_connect_ack(h.id);

        h.client.write_all(b"GET /").await.unwrap();
        assert_eq!(
            next_item(&mut h.work_rx).await,
            WorkItem::Send {
                session_id: h.id,
                payload: Bytes::from_static(b"GET /"),
            }
        );

        assert!(h
            .tunnel
            .on_inbound_delivery(h.id, Bytes::from_static(b"HTTP/1.1 200 OK")));

        let mut buf = [0u8; 15];
        tokio::time::timeout(Duration::from_secs(1), h.client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"HTTP/1.1 200 OK");

        h.cancel.cancel();
        assert_eq!(h.pump.await.unwrap(), PumpExit::Shutdown);
    }

    #[tokio::test]
    async fn test_inbound_before_ack_is_written_in_order() {
        let mut h = start_pump().await;

        h.tunnel.on_inbound_delivery(h.id, Bytes::from_static(b"one,"));
        h.tunnel.on_inbound_delivery(h.id, Bytes::from_static(b"two,"));
        h.tunnel.on_inbound_delivery(h.id, Bytes::from_static(b"three"));
        h.tunnel.on_connect_ack(h.id);

        let mut buf = [0u8; 13];
        tokio::time::timeout(Duration::from_secs(1), h.client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"one,two,three");

        h.cancel.cancel();
    }

    #[tokio::test]
    async fn test_shutdown_while_awaiting_connect() {
        let h = start_pump().await;
        let registry = Arc::clone(h.tunnel.registry());
        assert!(registry.contains(h.id));

        h.cancel.cancel();

        let exit = tokio::time::timeout(Duration::from_secs(1), h.pump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, PumpExit::Shutdown);
        assert!(!registry.contains(h.id));
    }

    #[tokio::test]
    async fn test_half_closed_client_still_receives() {
        let mut h = start_pump().await;
        let registry = Arc::clone(h.tunnel.registry());
        h.tunnel.on_connect_ack(h.id);

        h.client.write_all(b"GET /").await.unwrap();
        h.client.shutdown().await.unwrap();
        assert_eq!(
            next_item(&mut h.work_rx).await,
            WorkItem::Send {
                session_id: h.id,
                payload: Bytes::from_static(b"GET /"),
            }
        );

        // Give the pump time to observe EOF before the response arrives
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(registry.contains(h.id));
        assert!(!h.pump.is_finished());

        assert!(h
            .tunnel
            .on_inbound_delivery(h.id, Bytes::from_static(b"HTTP/1.1 200 OK")));

        let mut buf = [0u8; 15];
        tokio::time::timeout(Duration::from_secs(1), h.client.read_exact(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(&buf, b"HTTP/1.1 200 OK");

        // EOF stops reading only; nothing more is sent for the session
        assert!(h.work_rx.try_recv().is_err());
        assert!(!h.pump.is_finished());

        h.cancel.cancel();
        assert_eq!(h.pump.await.unwrap(), PumpExit::Shutdown);
        assert!(!registry.contains(h.id));
    }

    #[tokio::test]
    async fn test_write_to_gone_client_ends_relay() {
        let h = start_pump().await;
        let registry = Arc::clone(h.tunnel.registry());
        h.tunnel.on_connect_ack(h.id);

        drop(h.client);
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The first write draws a reset from the peer, a later one fails
        let pump = h.pump;
        let exit = tokio::time::timeout(Duration::from_secs(5), async {
            while !pump.is_finished() {
                h.tunnel
                    .on_inbound_delivery(h.id, Bytes::from_static(b"response"));
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            pump.await.unwrap()
        })
        .await
        .unwrap();

        assert_eq!(exit, PumpExit::SocketError);
        assert!(!registry.contains(h.id));
    }

    #[tokio::test]
    async fn test_unregistered_session_ends_pump() {
        let h = start_pump().await;
        h.tunnel.on_connect_ack(h.id);
        tokio::time::sleep(Duration::from_millis(20)).await;

        h.tunnel.registry().unregister(h.id);

        let exit = tokio::time::timeout(Duration::from_secs(1), h.pump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, PumpExit::SessionClosed);
    }

    #[tokio::test]
    async fn test_queue_closed_ends_relay() {
        let mut h = start_pump().await;
        h.tunnel.on_connect_ack(h.id);
        h.work_rx.close();

        h.client.write_all(b"nowhere to go").await.unwrap();

        let exit = tokio::time::timeout(Duration::from_secs(1), h.pump)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit, PumpExit::QueueClosed);
    }

    // Known gap: without a connect ack, a client that disappears is never
    // noticed and the session stays registered until shutdown.
    #[tokio::test]
    async fn test_vanished_client_lingers_while_awaiting_connect() {
        let h = start_pump().await;
        let registry = Arc::clone(h.tunnel.registry());

        drop(h.client);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(registry.contains(h.id));
        assert!(!h.pump.is_finished());

        h.cancel.cancel();
        assert_eq!(h.pump.await.unwrap(), PumpExit::Shutdown);
        assert!(registry.is_empty());
    }
}
