//! Test utilities and mocks for Taskrelay
//!
//! This module provides common test utilities used across integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use taskrelay::agent::AgentLink;
use taskrelay::config::{AgentConfig, Config, ProxyConfig};
use taskrelay::protocol::{
    read_ack, read_frame, read_hello, write_auth, write_frame, Ack, Auth, ServerFrame,
};
use taskrelay::session::{SessionId, SessionRegistry};
use taskrelay::tunnel::{ChannelTaskQueue, Notification, Tunnel, WorkItem};
use taskrelay::ProxyServer;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Create a test TCP listener on an available port
pub async fn create_test_listener() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Test configuration builder
pub struct TestConfigBuilder {
    token: String,
    read_chunk_size: usize,
    heartbeat_interval: u64,
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        TestConfigBuilder {
            token: "test-token".to_string(),
            read_chunk_size: 131070,
            heartbeat_interval: 30,
        }
    }
}

impl TestConfigBuilder {
    /// Create a new test config builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set token
    pub fn token(mut self, token: &str) -> Self {
        self.token = token.to_string();
        self
    }

    /// Set relay read chunk size
    pub fn read_chunk_size(mut self, size: usize) -> Self {
        self.read_chunk_size = size;
        self
    }

    /// Set heartbeat interval
    pub fn heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval = secs;
        self
    }

    /// Build the configuration, binding both listeners to ephemeral ports
    pub fn build(self) -> Config {
        Config {
            proxy: ProxyConfig {
                bind_addr: IpAddr::V4(Ipv4Addr::LOCALHOST),
                bind_port: 0,
                read_chunk_size: self.read_chunk_size,
                ..Default::default()
            },
            agent: AgentConfig {
                bind_addr: "127.0.0.1:0".to_string(),
                token: self.token,
                heartbeat_interval: self.heartbeat_interval,
            },
        }
    }
}

/// A running proxy with both listeners bound
pub struct TestProxy {
    /// SOCKS listener address
    pub socks_addr: SocketAddr,
    /// Agent link address
    pub agent_addr: SocketAddr,
    /// Shared registry, for assertions
    pub registry: Arc<SessionRegistry>,
    /// Shutdown token
    pub cancel: CancellationToken,
    server: JoinHandle<anyhow::Result<()>>,
    agent: JoinHandle<anyhow::Result<()>>,
}

impl TestProxy {
    /// Start a proxy from the given configuration
    pub async fn start(config: Config) -> TestProxy {
        let registry = Arc::new(SessionRegistry::new());
        let (queue, work_rx) = ChannelTaskQueue::new();
        let tunnel = Tunnel::new(registry.clone(), Arc::new(queue));
        let cancel = CancellationToken::new();

        let agent_listener = AgentLink::bind(&config.agent).unwrap();
        let agent_addr = agent_listener.local_addr().unwrap();
        let agent = AgentLink::new(config.agent, tunnel.clone(), work_rx, cancel.clone());
        let agent = tokio::spawn(agent.run(agent_listener));

        let server = ProxyServer::new(config.proxy, tunnel, cancel.clone());
        let listener = server.bind().unwrap();
        let socks_addr = listener.local_addr().unwrap();
        let server = tokio::spawn(server.serve(listener));

        TestProxy {
            socks_addr,
            agent_addr,
            registry,
            cancel,
            server,
            agent,
        }
    }

    /// Cancel and wait for both accept loops to finish
    pub async fn shutdown(self) {
        self.cancel.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.server)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        tokio::time::timeout(Duration::from_secs(5), self.agent)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
    }
}

/// Scripted agent speaking the agent link protocol
pub struct FakeAgent {
    conn: TcpStream,
}

impl FakeAgent {
    /// Connect and authenticate with `token`
    pub async fn connect(addr: SocketAddr, token: &str) -> (FakeAgent, Ack) {
        let mut conn = TcpStream::connect(addr).await.unwrap();
        let hello = read_hello(&mut conn).await.unwrap();
        write_auth(&mut conn, &Auth::new(token, &hello.nonce))
            .await
            .unwrap();
        let ack = read_ack(&mut conn).await.unwrap();
        (FakeAgent { conn }, ack)
    }

    /// Next work item, skipping heartbeats
    pub async fn next_work(&mut self) -> WorkItem {
        loop {
            let frame: ServerFrame = read_frame(&mut self.conn)
                .await
                .unwrap()
                .expect("agent link closed");
            if let ServerFrame::Work(item) = frame {
                return item;
            }
        }
    }

    /// Next work item, or `None` if nothing arrives within `wait`
    pub async fn next_work_within(&mut self, wait: Duration) -> Option<WorkItem> {
        tokio::time::timeout(wait, self.next_work()).await.ok()
    }

    /// Report that the destination of a session connected
    pub async fn connect_ack(&mut self, session_id: SessionId) {
        write_frame(&mut self.conn, &Notification::ConnectAck { session_id })
            .await
            .unwrap();
    }

    /// Deliver destination bytes to a session
    pub async fn deliver(&mut self, session_id: SessionId, payload: &'static [u8]) {
        write_frame(
            &mut self.conn,
            &Notification::Deliver {
                session_id,
                payload: bytes::Bytes::from_static(payload),
            },
        )
        .await
        .unwrap();
    }
}

/// Mock SOCKS4 handshake data
pub mod socks4_mock {
    use taskrelay::socks::*;

    /// Reply for a granted request
    pub const GRANTED: [u8; 8] = [SOCKS4_REPLY_VERSION, SOCKS4_REPLY_GRANTED, 0, 0, 0, 0, 0, 0];

    /// Reply for a rejected request
    pub const REJECTED: [u8; 8] = [SOCKS4_REPLY_VERSION, SOCKS4_REPLY_REJECTED, 0, 0, 0, 0, 0, 0];

    /// Create a CONNECT request to an IPv4 address
    pub fn create_connect_ipv4(ip: [u8; 4], port: u16) -> Vec<u8> {
        let mut cmd = vec![SOCKS4_VERSION, SOCKS4_CMD_CONNECT];
        cmd.extend_from_slice(&port.to_be_bytes());
        cmd.extend_from_slice(&ip);
        cmd.push(0);
        cmd
    }

    /// Create a SOCKS4a CONNECT request to a domain
    pub fn create_connect_domain(domain: &str, port: u16) -> Vec<u8> {
        let mut cmd = create_connect_ipv4([0, 0, 0, 1], port);
        cmd.extend_from_slice(domain.as_bytes());
        cmd.push(0);
        cmd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_create_test_listener() {
        let (listener, addr) = create_test_listener().await;
        assert!(addr.port() > 0);
        drop(listener);
    }

    #[test]
    fn test_config_builder() {
        let config = TestConfigBuilder::new()
            .token("my-token")
            .read_chunk_size(4096)
            .heartbeat_interval(5)
            .build();

        assert_eq!(config.agent.token, "my-token");
        assert_eq!(config.proxy.read_chunk_size, 4096);
        assert_eq!(config.agent.heartbeat_interval, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_socks4_mock_requests() {
        let request = socks4_mock::create_connect_ipv4([1, 2, 3, 4], 80);
        assert_eq!(request, vec![4, 1, 0, 80, 1, 2, 3, 4, 0]);

        let request = socks4_mock::create_connect_domain("example.com", 443);
        assert_eq!(&request[4..8], &[0, 0, 0, 1]);
        assert!(request.ends_with(b"example.com\0"));
    }
}
