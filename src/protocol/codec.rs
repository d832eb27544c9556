//! Agent link codec
//!
//! The handshake messages have a fixed bincode size and are read with a
//! single `read_exact`. Everything after the handshake is a length-prefixed
//! frame: a big-endian `u32` length followed by the bincode body.

use super::types::{Ack, Auth, Hello, CURRENT_PROTO_VERSION, HASH_WIDTH_IN_BYTES};
use crate::error::TaskRelayError;
use lazy_static::lazy_static;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::trace;

/// Largest frame body accepted from the peer
pub const MAX_FRAME_LEN: usize = 16 * 1024 * 1024;

/// Packet lengths for fixed-size handshake messages
struct PacketLength {
    hello: usize,
    ack: usize,
    auth: usize,
}

impl PacketLength {
    fn new() -> PacketLength {
        let d = [0u8; HASH_WIDTH_IN_BYTES];
        PacketLength {
            hello: serialized_len(&Hello::new(d)),
            ack: serialized_len(&Ack::Ok),
            auth: serialized_len(&Auth(d)),
        }
    }
}

fn serialized_len<T: Serialize>(value: &T) -> usize {
    bincode::serialized_size(value)
        .map(|n| n as usize)
        .unwrap_or(0)
}

lazy_static! {
    static ref PACKET_LEN: PacketLength = PacketLength::new();
}

fn serialize<T: Serialize>(value: &T, what: &str) -> Result<Vec<u8>, TaskRelayError> {
    bincode::serialize(value)
        .map_err(|e| TaskRelayError::Serialization(format!("Failed to serialize {}: {}", what, e)))
}

fn deserialize<T: DeserializeOwned>(buf: &[u8], what: &str) -> Result<T, TaskRelayError> {
    bincode::deserialize(buf).map_err(|e| {
        TaskRelayError::Serialization(format!("Failed to deserialize {}: {}", what, e))
    })
}

async fn read_fixed<T, C>(conn: &mut C, len: usize, what: &str) -> Result<T, TaskRelayError>
where
    T: DeserializeOwned,
    C: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; len];
    conn.read_exact(&mut buf).await?;
    deserialize(&buf, what)
}

async fn write_fixed<T, C>(conn: &mut C, value: &T, what: &str) -> Result<(), TaskRelayError>
where
    T: Serialize,
    C: AsyncWrite + Unpin,
{
    let buf = serialize(value, what)?;
    conn.write_all(&buf).await?;
    conn.flush().await?;
    Ok(())
}

/// Read a Hello message and check its protocol version
pub async fn read_hello<T: AsyncRead + Unpin>(conn: &mut T) -> Result<Hello, TaskRelayError> {
    let hello: Hello = read_fixed(conn, PACKET_LEN.hello, "hello").await?;

    if hello.version != CURRENT_PROTO_VERSION {
        return Err(TaskRelayError::Protocol(format!(
            "Protocol version mismatched. Expected {}, got {}",
            CURRENT_PROTO_VERSION, hello.version
        )));
    }

    Ok(hello)
}

/// Write a Hello message to the stream
pub async fn write_hello<T: AsyncWrite + Unpin>(
    conn: &mut T,
    hello: &Hello,
) -> Result<(), TaskRelayError> {
    write_fixed(conn, hello, "hello").await
}

/// Read an Auth message from the stream
pub async fn read_auth<T: AsyncRead + Unpin>(conn: &mut T) -> Result<Auth, TaskRelayError> {
    read_fixed(conn, PACKET_LEN.auth, "auth").await
}

/// Write an Auth message to the stream
pub async fn write_auth<T: AsyncWrite + Unpin>(
    conn: &mut T,
    auth: &Auth,
) -> Result<(), TaskRelayError> {
    write_fixed(conn, auth, "auth").await
}

/// Read an Ack message from the stream
pub async fn read_ack<T: AsyncRead + Unpin>(conn: &mut T) -> Result<Ack, TaskRelayError> {
    read_fixed(conn, PACKET_LEN.ack, "ack").await
}

/// Write an Ack message to the stream
pub async fn write_ack<T: AsyncWrite + Unpin>(
    conn: &mut T,
    ack: &Ack,
) -> Result<(), TaskRelayError> {
    write_fixed(conn, ack, "ack").await
}

/// Write one length-prefixed frame
pub async fn write_frame<T, C>(conn: &mut C, value: &T) -> Result<(), TaskRelayError>
where
    T: Serialize,
    C: AsyncWrite + Unpin,
{
    let body = serialize(value, "frame")?;
    if body.len() > MAX_FRAME_LEN {
        return Err(TaskRelayError::Protocol(format!(
            "Frame of {} bytes exceeds limit of {}",
            body.len(),
            MAX_FRAME_LEN
        )));
    }

    trace!("Write frame of length {}", body.len());
    conn.write_u32(body.len() as u32).await?;
    conn.write_all(&body).await?;
    conn.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
///
/// Returns `Ok(None)` when the peer closed the connection on a frame boundary.
pub async fn read_frame<T, C>(conn: &mut C) -> Result<Option<T>, TaskRelayError>
where
    T: DeserializeOwned,
    C: AsyncRead + Unpin,
{
    let len = match conn.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if len > MAX_FRAME_LEN {
        return Err(TaskRelayError::Protocol(format!(
            "Frame of {} bytes exceeds limit of {}",
            len, MAX_FRAME_LEN
        )));
    }

    trace!("Read frame of length {}", len);
    let mut body = vec![0u8; len];
    conn.read_exact(&mut body).await?;
    deserialize(&body, "frame").map(Some)
}
