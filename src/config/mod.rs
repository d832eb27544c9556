//! Configuration module for Taskrelay
//!
//! This module provides configuration types and parsing for the proxy.

mod agent;
mod proxy;

pub use agent::AgentConfig;
pub use proxy::ProxyConfig;

use crate::error::TaskRelayError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// SOCKS listener configuration
    #[serde(default)]
    pub proxy: ProxyConfig,

    /// Agent link configuration
    pub agent: AgentConfig,
}

impl Config {
    /// Validate every section
    pub fn validate(&self) -> Result<(), TaskRelayError> {
        self.proxy.validate().map_err(TaskRelayError::Config)?;
        self.agent.validate().map_err(TaskRelayError::Config)?;
        Ok(())
    }
}

/// Load configuration from a TOML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    parse_config(&content)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config =
        toml::from_str(content).with_context(|| "Failed to parse configuration")?;
    config.validate()?;
    Ok(config)
}
