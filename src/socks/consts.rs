//! SOCKS4 protocol constants
//!
//! Defines all constants used in the SOCKS4/4a protocol implementation.

/// SOCKS4 protocol version
pub const SOCKS4_VERSION: u8 = 0x04;

/// Version byte of a SOCKS4 reply (always null)
pub const SOCKS4_REPLY_VERSION: u8 = 0x00;

// Commands
/// Stream CONNECT command
pub const SOCKS4_CMD_CONNECT: u8 = 0x01;
/// Port BIND command (not supported)
pub const SOCKS4_CMD_BIND: u8 = 0x02;

// Reply codes
/// Request granted
pub const SOCKS4_REPLY_GRANTED: u8 = 0x5A;
/// Request rejected or failed
pub const SOCKS4_REPLY_REJECTED: u8 = 0x5B;

// Layout
/// Length of the fixed request header (VN, CD, DSTPORT, DSTIP)
pub const SOCKS4_HEADER_LEN: usize = 8;
/// Length of a reply
pub const SOCKS4_REPLY_LEN: usize = 8;
/// Offset of the null-terminated user id
pub const SOCKS4_USER_ID_OFFSET: usize = 8;

/// Textual prefix of the SOCKS4a marker address range
pub const SOCKS4A_ADDR_PREFIX: &str = "0.0.0.";

/// Maximum domain name length
pub const MAX_DOMAIN_LEN: usize = 255;
