//! SOCKS4 command parsing module
//!
//! Handles parsing SOCKS4 requests and building replies.

mod parser;
mod reply;

pub use parser::{first_ipv4, parse_request, resolve_domain};
pub use reply::{build_reply, reply_bytes, send_granted};
