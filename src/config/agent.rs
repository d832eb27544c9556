//! Agent link configuration
//!
//! Defines the `[agent]` section of the configuration file.

use crate::helper::DEFAULT_HEARTBEAT_INTERVAL_SECS;
use serde::{Deserialize, Serialize};

/// Default agent link bind address
fn default_agent_bind_addr() -> String {
    "127.0.0.1:7000".to_string()
}

/// Default heartbeat interval in seconds
fn default_heartbeat_interval() -> u64 {
    DEFAULT_HEARTBEAT_INTERVAL_SECS
}

/// Agent link configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentConfig {
    /// Address the agent link listens on (e.g., "127.0.0.1:7000")
    #[serde(default = "default_agent_bind_addr")]
    pub bind_addr: String,

    /// Shared secret the agent authenticates with
    pub token: String,

    /// Heartbeat interval in seconds
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval: u64,
}

impl AgentConfig {
    /// Create a config with the given token and defaults elsewhere
    pub fn with_token(token: impl Into<String>) -> Self {
        AgentConfig {
            bind_addr: default_agent_bind_addr(),
            token: token.into(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.token.is_empty() {
            return Err("agent token must not be empty".to_string());
        }
        if self.heartbeat_interval == 0 {
            return Err("heartbeat_interval must be greater than zero".to_string());
        }
        if self.bind_addr.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!("invalid agent bind address: {}", self.bind_addr));
        }
        Ok(())
    }
}
