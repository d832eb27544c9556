//! SOCKS4 handshake
//!
//! Reads the CONNECT request off a freshly accepted connection, validates
//! it and answers with a granted or rejected reply.

use crate::error::{Socks4Error, Socks4ReplyCode};
use crate::socks::command::{build_reply, parse_request, send_granted};
use crate::socks::types::Socks4Request;
use bytes::BytesMut;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::debug;

/// Read one burst of bytes from the stream
///
/// Keeps reading while every read fills the whole buffer, so a request
/// written in one go by the client arrives as one piece. Stops on the
/// first short read or at end of stream.
pub async fn read_datagram<S>(stream: &mut S, chunk_size: usize) -> io::Result<BytesMut>
where
    S: AsyncRead + Unpin,
{
    let mut data = BytesMut::new();
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            break;
        }
    }

    Ok(data)
}

/// Perform the server side of the SOCKS4 handshake
///
/// On success the granted reply has already been written and the parsed
/// request is returned. On failure the rejected reply has been written
/// (best effort) and the caller should drop the connection.
pub async fn handshake<S>(stream: &mut S, chunk_size: usize) -> Result<Socks4Request, Socks4Error>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let data = read_datagram(stream, chunk_size).await?;

    match parse_request(&data).await {
        Ok(request) => {
            send_granted(stream).await?;
            Ok(request)
        }
        Err(e) => {
            if let Err(write_err) = build_reply(stream, Socks4ReplyCode::from(&e)).await {
                debug!("Failed to send SOCKS4 rejection: {}", write_err);
            }
            Err(e)
        }
    }
}
