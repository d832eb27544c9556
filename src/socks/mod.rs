//! SOCKS4 module for Taskrelay
//!
//! This module implements the client-facing SOCKS4/4a protocol: parsing the
//! CONNECT request (including SOCKS4a domain resolution) and encoding the
//! reply. It never opens outbound connections itself.

mod command;
mod consts;
mod handshake;
mod types;

pub use command::{
    build_reply, first_ipv4, parse_request, reply_bytes, resolve_domain, send_granted,
};
pub use consts::*;
pub use handshake::{handshake, read_datagram};
pub use types::{is_socks4a_marker, Socks4Command, Socks4Request};
