//! SOCKS4 reply builder
//!
//! Constructs SOCKS4 reply messages.

use crate::error::Socks4ReplyCode;
use crate::socks::consts::*;
use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Build the bytes of a SOCKS4 reply
///
/// # SOCKS4 Reply Format
///
/// ```text
/// +----+----+----+----+----+----+----+----+
/// | VN | CD | DSTPORT |      DSTIP        |
/// +----+----+----+----+----+----+----+----+
///   1    1      2              4
/// ```
///
/// VN is null and the port/address fields are zero, since they only carry
/// meaning for BIND.
pub fn reply_bytes(code: Socks4ReplyCode) -> [u8; SOCKS4_REPLY_LEN] {
    let mut reply = [0u8; SOCKS4_REPLY_LEN];
    reply[0] = SOCKS4_REPLY_VERSION;
    reply[1] = code.into();
    reply
}

/// Build and send a SOCKS4 reply
pub async fn build_reply<S>(stream: &mut S, code: Socks4ReplyCode) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    stream.write_all(&reply_bytes(code)).await?;
    stream.flush().await
}

/// Send the "request granted" reply
pub async fn send_granted<S>(stream: &mut S) -> io::Result<()>
where
    S: AsyncWrite + Unpin,
{
    build_reply(stream, Socks4ReplyCode::Granted).await
}
