//! SHA-256 digest used for agent authentication

use super::types::{Digest, HASH_WIDTH_IN_BYTES};
use sha2::{Digest as Sha2Digest, Sha256};

/// Compute SHA-256 digest of data
///
/// ```
/// use taskrelay::protocol::digest;
///
/// let hash = digest(b"token and nonce");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn digest(data: &[u8]) -> Digest {
    let d = Sha256::new().chain_update(data).finalize();
    let mut result = [0u8; HASH_WIDTH_IN_BYTES];
    result.copy_from_slice(&d);
    result
}
