//! # Taskrelay - SOCKS4 Proxy over an Agent Task Queue
//!
//! Taskrelay accepts local SOCKS4/4a clients and carries every session
//! through a remote agent instead of connecting to the destination itself.
//! Outbound connection requests and client bytes become work items on a
//! task queue; the agent reports back when a destination is connected and
//! when bytes arrive from it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use taskrelay::config::load_config;
//! use taskrelay::run_proxy;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = load_config("config.toml")?;
//!     run_proxy(config, CancellationToken::new()).await
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! SOCKS4 Client -> Taskrelay -> task queue -> Agent -> Target
//!               <-           <- notifications <-
//! ```
//!
//! Each accepted client is handled by its own task: the SOCKS4 handshake,
//! registration in the [`session::SessionRegistry`], a `connect` work item,
//! and then the [`session::SessionPump`] relay loop.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod agent;
pub mod config;
pub mod error;
pub mod helper;
pub mod protocol;
pub mod server;
pub mod session;
pub mod socks;
pub mod tunnel;

// Re-export commonly used items
pub use config::{load_config, Config};
pub use error::{Socks4Error, TaskRelayError};
pub use server::{run_proxy, ProxyServer};

/// Version of the Taskrelay library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
