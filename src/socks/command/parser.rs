//! SOCKS4 request parser
//!
//! Parses SOCKS4 and SOCKS4a CONNECT requests from the raw request bytes.

use crate::error::Socks4Error;
use crate::socks::consts::*;
use crate::socks::types::{is_socks4a_marker, Socks4Command, Socks4Request};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use tracing::debug;

/// Parse a SOCKS4 request
///
/// # SOCKS4 Request Format
///
/// ```text
/// +----+----+----+----+----+----+----+----+----+----+....+----+
/// | VN | CD | DSTPORT |      DSTIP        | USERID       |NULL|
/// +----+----+----+----+----+----+----+----+----+----+....+----+
///   1    1      2              4           variable       1
/// ```
///
/// When DSTIP is `0.0.0.x` the user id is followed by a null-terminated
/// domain name (SOCKS4a), which is resolved here. Only CONNECT is accepted.
pub async fn parse_request(data: &[u8]) -> Result<Socks4Request, Socks4Error> {
    if data.is_empty() {
        return Err(Socks4Error::EmptyRequest);
    }

    let version = data[0];
    if version != SOCKS4_VERSION {
        return Err(Socks4Error::UnsupportedVersion(version));
    }

    if data.len() < SOCKS4_HEADER_LEN {
        return Err(Socks4Error::Truncated(data.len()));
    }

    let cmd_byte = data[1];
    let command = match Socks4Command::from_byte(cmd_byte) {
        Some(Socks4Command::StreamConnect) => Socks4Command::StreamConnect,
        _ => return Err(Socks4Error::CommandNotSupported(cmd_byte)),
    };

    let port = u16::from_be_bytes([data[2], data[3]]);
    let addr = Ipv4Addr::new(data[4], data[5], data[6], data[7]);

    let (user_id, rest) = split_null_terminated(&data[SOCKS4_USER_ID_OFFSET..]);
    let user_id = String::from_utf8_lossy(user_id).into_owned();

    if !is_socks4a_marker(&addr) {
        return Ok(Socks4Request::new(
            command,
            SocketAddrV4::new(addr, port),
            user_id,
            None,
        ));
    }

    let (domain, _) = split_null_terminated(rest);
    let domain = parse_domain(domain)?;
    let resolved = resolve_domain(&domain, port).await?;

    debug!("Resolved SOCKS4a domain {} to {}", domain, resolved);

    Ok(Socks4Request::new(
        command,
        SocketAddrV4::new(resolved, port),
        user_id,
        Some(domain),
    ))
}

/// Resolve a domain name and pick the first IPv4 result
pub async fn resolve_domain(domain: &str, port: u16) -> Result<Ipv4Addr, Socks4Error> {
    let addrs = tokio::net::lookup_host((domain, port))
        .await
        .map_err(|source| Socks4Error::ResolutionFailed {
            domain: domain.to_string(),
            source,
        })?;

    first_ipv4(addrs).ok_or_else(|| Socks4Error::NoIpv4Address(domain.to_string()))
}

/// Pick the first IPv4 address out of a resolver result set
pub fn first_ipv4<I>(addrs: I) -> Option<Ipv4Addr>
where
    I: IntoIterator<Item = SocketAddr>,
{
    addrs.into_iter().find_map(|addr| match addr {
        SocketAddr::V4(v4) => Some(*v4.ip()),
        SocketAddr::V6(_) => None,
    })
}

/// Split a byte slice at its first null byte
///
/// Returns the bytes before the null and the bytes after it. A missing
/// terminator consumes the whole slice.
fn split_null_terminated(data: &[u8]) -> (&[u8], &[u8]) {
    match data.iter().position(|&b| b == 0) {
        Some(pos) => (&data[..pos], &data[pos + 1..]),
        None => (data, &[]),
    }
}

fn parse_domain(raw: &[u8]) -> Result<String, Socks4Error> {
    if raw.is_empty() || raw.len() > MAX_DOMAIN_LEN {
        return Err(Socks4Error::InvalidDomain(format!(
            "invalid length {}",
            raw.len()
        )));
    }

    let domain = std::str::from_utf8(raw)
        .map_err(|_| Socks4Error::InvalidDomain("not valid UTF-8".to_string()))?;

    Ok(domain.to_string())
}
