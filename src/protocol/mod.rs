//! Protocol module for Taskrelay
//!
//! This module implements the wire protocol spoken between the proxy and
//! the remote agent: a challenge/response handshake followed by a stream
//! of length-prefixed frames.

mod codec;
mod digest;
mod types;

pub use codec::{
    read_ack, read_auth, read_frame, read_hello, write_ack, write_auth, write_frame,
    write_hello, MAX_FRAME_LEN,
};
pub use digest::digest;
pub use types::{
    Ack, Auth, Digest, Hello, ServerFrame, CURRENT_PROTO_VERSION, HASH_WIDTH_IN_BYTES,
};
