//! Vless and Trojan first-frame parsing.
//!
//! Zero-copy decoders for the header carried in the first WebSocket message of
//! a tunnel session. [`classify`] picks the protocol from the leading bytes and
//! [`parse_header`] decodes it; every access is bounds-checked, so a short or
//! malformed frame yields a [`ParseError`] instead of a panic.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};

use bytes::BytesMut;

/// Length of the Trojan password hash (hex-encoded SHA-224).
pub const HASH_LEN: usize = 56;
/// Length of the Vless credential.
pub const UUID_LEN: usize = 16;
/// Frames must be longer than this to be classified as Vless.
pub const VLESS_MIN_LEN: usize = 18;

/// Offset of the Vless addon-length byte.
const VLESS_ADDON_LEN_OFFSET: usize = 1 + UUID_LEN;

pub const ATYP_IPV4: u8 = 0x01;
pub const ATYP_DOMAIN: u8 = 0x02;
pub const ATYP_IPV6: u8 = 0x03;

/// Maximum domain name length.
pub const MAX_DOMAIN_LEN: usize = 255;

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The frame ended before the field at `needed - 1` could be read.
    #[error("frame truncated: need at least {needed} bytes")]
    Truncated { needed: usize },
    #[error("unknown address type {0}")]
    UnknownAddressType(u8),
    #[error("empty domain")]
    EmptyDomain,
    #[error("domain is not valid utf-8")]
    InvalidUtf8,
}

/// Errors that can occur when writing protocol data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum WriteError {
    #[error("domain exceeds 255 bytes")]
    DomainTooLong,
    #[error("hash must be exactly 56 bytes")]
    InvalidHashLen,
}

/// Protocol spoken on a session, decided from the first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtocolVariant {
    Vless,
    Trojan,
}

impl ProtocolVariant {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vless => "vless",
            Self::Trojan => "trojan",
        }
    }
}

impl fmt::Display for ProtocolVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostRef<'a> {
    Ipv4([u8; 4]),
    Ipv6([u8; 16]),
    Domain(&'a str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressRef<'a> {
    pub host: HostRef<'a>,
    pub port: u16,
}

impl fmt::Display for AddressRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.host {
            HostRef::Ipv4(ip) => write!(f, "{}:{}", Ipv4Addr::from(ip), self.port),
            HostRef::Ipv6(ip) => write!(f, "[{}]:{}", Ipv6Addr::from(ip), self.port),
            HostRef::Domain(d) => write!(f, "{}:{}", d, self.port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VlessHeader<'a> {
    pub version: u8,
    pub uuid: &'a [u8; UUID_LEN],
    pub addons_len: u8,
    /// Recorded, not acted on.
    pub command: u8,
    pub address: AddressRef<'a>,
    /// Offset of the first post-header byte within the frame.
    pub payload_offset: usize,
    pub payload: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrojanHeader<'a> {
    pub hash: &'a [u8; HASH_LEN],
    /// Everything after the hash, left unparsed.
    pub rest: &'a [u8],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Header<'a> {
    Vless(VlessHeader<'a>),
    Trojan(TrojanHeader<'a>),
}

impl Header<'_> {
    pub fn protocol(&self) -> ProtocolVariant {
        match self {
            Header::Vless(_) => ProtocolVariant::Vless,
            Header::Trojan(_) => ProtocolVariant::Trojan,
        }
    }
}

/// Vless when byte 0 is zero and the frame is long enough to hold the
/// credential and addon-length byte; everything else is treated as Trojan.
#[inline]
pub fn classify(frame: &[u8]) -> ProtocolVariant {
    if frame.len() >= VLESS_MIN_LEN && frame[0] == 0 {
        ProtocolVariant::Vless
    } else {
        ProtocolVariant::Trojan
    }
}

/// Classify and decode the first frame of a session.
pub fn parse_header(frame: &[u8]) -> Result<Header<'_>, ParseError> {
    match classify(frame) {
        ProtocolVariant::Vless => parse_vless(frame).map(Header::Vless),
        ProtocolVariant::Trojan => parse_trojan(frame).map(Header::Trojan),
    }
}

/// Decode a Vless request header.
///
/// Layout: version, 16-byte uuid, addon length `A`, `A` addon bytes, command,
/// port (u16 BE), address type, address, payload.
pub fn parse_vless(frame: &[u8]) -> Result<VlessHeader<'_>, ParseError> {
    let uuid: &[u8; UUID_LEN] = frame
        .get(1..1 + UUID_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(ParseError::Truncated {
            needed: 1 + UUID_LEN,
        })?;
    let addons_len = byte_at(frame, VLESS_ADDON_LEN_OFFSET)?;
    let command_offset = VLESS_ADDON_LEN_OFFSET + 1 + addons_len as usize;
    let command = byte_at(frame, command_offset)?;

    let mut cursor = command_offset + 1;
    let port = read_u16(frame, cursor)?;
    cursor += 2;
    let atyp = byte_at(frame, cursor)?;
    cursor += 1;

    let host = match atyp {
        ATYP_IPV4 => {
            let ip = take::<4>(frame, cursor)?;
            cursor += 4;
            HostRef::Ipv4(ip)
        }
        ATYP_DOMAIN => {
            let len = byte_at(frame, cursor)? as usize;
            cursor += 1;
            if len == 0 {
                return Err(ParseError::EmptyDomain);
            }
            let raw = slice(frame, cursor, len)?;
            cursor += len;
            let domain = std::str::from_utf8(raw).map_err(|_| ParseError::InvalidUtf8)?;
            HostRef::Domain(domain)
        }
        ATYP_IPV6 => {
            let ip = take::<16>(frame, cursor)?;
            cursor += 16;
            HostRef::Ipv6(ip)
        }
        other => return Err(ParseError::UnknownAddressType(other)),
    };

    Ok(VlessHeader {
        version: frame[0],
        uuid,
        addons_len,
        command,
        address: AddressRef { host, port },
        payload_offset: cursor,
        payload: &frame[cursor..],
    })
}

/// Split off the 56-byte password hash; the remainder is kept as-is.
pub fn parse_trojan(frame: &[u8]) -> Result<TrojanHeader<'_>, ParseError> {
    let hash: &[u8; HASH_LEN] = frame
        .get(..HASH_LEN)
        .and_then(|s| s.try_into().ok())
        .ok_or(ParseError::Truncated { needed: HASH_LEN })?;
    Ok(TrojanHeader {
        hash,
        rest: &frame[HASH_LEN..],
    })
}

/// Writes a Vless request header followed by `payload`.
#[allow(clippy::cast_possible_truncation)]
pub fn write_vless_request(
    buf: &mut BytesMut,
    uuid: &[u8; UUID_LEN],
    address: &AddressRef<'_>,
    payload: &[u8],
) -> Result<(), WriteError> {
    buf.extend_from_slice(&[0]);
    buf.extend_from_slice(uuid);
    // no addons, command connect
    buf.extend_from_slice(&[0, 0x01]);
    buf.extend_from_slice(&address.port.to_be_bytes());
    match address.host {
        HostRef::Ipv4(ip) => {
            buf.extend_from_slice(&[ATYP_IPV4]);
            buf.extend_from_slice(&ip);
        }
        HostRef::Domain(d) => {
            if d.len() > MAX_DOMAIN_LEN {
                return Err(WriteError::DomainTooLong);
            }
            buf.extend_from_slice(&[ATYP_DOMAIN, d.len() as u8]);
            buf.extend_from_slice(d.as_bytes());
        }
        HostRef::Ipv6(ip) => {
            buf.extend_from_slice(&[ATYP_IPV6]);
            buf.extend_from_slice(&ip);
        }
    }
    buf.extend_from_slice(payload);
    Ok(())
}

/// Writes a Trojan hash followed by `rest`.
pub fn write_trojan_request(
    buf: &mut BytesMut,
    hash_hex: &[u8],
    rest: &[u8],
) -> Result<(), WriteError> {
    if hash_hex.len() != HASH_LEN {
        return Err(WriteError::InvalidHashLen);
    }
    buf.extend_from_slice(hash_hex);
    buf.extend_from_slice(rest);
    Ok(())
}

#[inline]
fn byte_at(buf: &[u8], offset: usize) -> Result<u8, ParseError> {
    buf.get(offset)
        .copied()
        .ok_or(ParseError::Truncated { needed: offset + 1 })
}

#[inline]
fn slice(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], ParseError> {
    buf.get(offset..offset + len).ok_or(ParseError::Truncated {
        needed: offset + len,
    })
}

#[inline]
fn take<const N: usize>(buf: &[u8], offset: usize) -> Result<[u8; N], ParseError> {
    let mut out = [0u8; N];
    out.copy_from_slice(slice(buf, offset, N)?);
    Ok(out)
}

#[inline]
fn read_u16(buf: &[u8], offset: usize) -> Result<u16, ParseError> {
    Ok(u16::from_be_bytes(take::<2>(buf, offset)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: [u8; UUID_LEN] = [
        0x6c, 0xf6, 0x27, 0xde, 0x1a, 0x2b, 0x4c, 0x3d, 0x9e, 0x8f, 0x70, 0x61, 0x52, 0x43, 0x34,
        0x25,
    ];

    fn vless_frame(addons: &[u8], atyp: u8, addr: &[u8], payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0u8];
        frame.extend_from_slice(&UUID);
        frame.push(addons.len() as u8);
        frame.extend_from_slice(addons);
        frame.push(0x01);
        frame.extend_from_slice(&8080u16.to_be_bytes());
        frame.push(atyp);
        frame.extend_from_slice(addr);
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn classify_requires_zero_byte_and_length() {
        assert_eq!(classify(&[0u8; 18]), ProtocolVariant::Vless);
        assert_eq!(classify(&[0u8; 17]), ProtocolVariant::Trojan);
        assert_eq!(classify(&[1u8; 64]), ProtocolVariant::Trojan);
        assert_eq!(classify(&[]), ProtocolVariant::Trojan);
    }

    #[test]
    fn vless_ipv4_with_payload() {
        let frame = vless_frame(&[], ATYP_IPV4, &[10, 0, 0, 1], b"GET /");
        let Header::Vless(h) = parse_header(&frame).unwrap() else {
            panic!("expected vless");
        };
        assert_eq!(h.version, 0);
        assert_eq!(h.uuid, &UUID);
        assert_eq!(h.command, 0x01);
        assert_eq!(
            h.address,
            AddressRef {
                host: HostRef::Ipv4([10, 0, 0, 1]),
                port: 8080
            }
        );
        assert_eq!(h.payload_offset, frame.len() - 5);
        assert_eq!(h.payload, b"GET /");
    }

    #[test]
    fn vless_addons_shift_cursor() {
        let frame = vless_frame(&[0xaa, 0xbb, 0xcc], ATYP_IPV4, &[1, 2, 3, 4], b"x");
        let h = parse_vless(&frame).unwrap();
        assert_eq!(h.addons_len, 3);
        assert_eq!(h.address.host, HostRef::Ipv4([1, 2, 3, 4]));
        assert_eq!(h.payload, b"x");
    }

    #[test]
    fn vless_domain_and_ipv6() {
        let mut addr = vec![11u8];
        addr.extend_from_slice(b"example.com");
        let frame = vless_frame(&[], ATYP_DOMAIN, &addr, b"");
        let h = parse_vless(&frame).unwrap();
        assert_eq!(h.address.host, HostRef::Domain("example.com"));
        assert!(h.payload.is_empty());
        assert_eq!(h.address.to_string(), "example.com:8080");

        let mut v6 = [0u8; 16];
        v6[15] = 1;
        let frame = vless_frame(&[], ATYP_IPV6, &v6, b"p");
        let h = parse_vless(&frame).unwrap();
        assert_eq!(h.address.host, HostRef::Ipv6(v6));
        assert_eq!(h.address.to_string(), "[::1]:8080");
    }

    #[test]
    fn vless_errors() {
        assert_eq!(
            parse_vless(&vless_frame(&[], 9, &[1, 2, 3, 4], b"")),
            Err(ParseError::UnknownAddressType(9))
        );
        assert_eq!(
            parse_vless(&vless_frame(&[], ATYP_DOMAIN, &[0], b"")),
            Err(ParseError::EmptyDomain)
        );
        assert_eq!(
            parse_vless(&vless_frame(&[], ATYP_DOMAIN, &[2, 0xff, 0xfe], b"")),
            Err(ParseError::InvalidUtf8)
        );
    }

    #[test]
    fn every_truncation_is_an_error() {
        let frame = vless_frame(&[0x01], ATYP_IPV4, &[1, 2, 3, 4], b"");
        for len in VLESS_MIN_LEN..frame.len() {
            assert!(
                matches!(parse_vless(&frame[..len]), Err(ParseError::Truncated { .. })),
                "len {len}"
            );
        }
        assert!(parse_vless(&frame).is_ok());
    }

    #[test]
    fn addon_length_past_end_is_truncated() {
        let mut frame = vec![0u8; VLESS_MIN_LEN];
        frame[VLESS_ADDON_LEN_OFFSET] = 0xff;
        assert_eq!(
            parse_header(&frame),
            Err(ParseError::Truncated { needed: 18 + 0xff + 1 })
        );
    }

    #[test]
    fn trojan_keeps_remainder_unparsed() {
        let mut frame = vec![b'a'; HASH_LEN];
        frame.extend_from_slice(b"\r\n\x01anything");
        let Header::Trojan(h) = parse_header(&frame).unwrap() else {
            panic!("expected trojan");
        };
        assert_eq!(h.hash, &[b'a'; HASH_LEN]);
        assert_eq!(h.rest, b"\r\n\x01anything");

        assert_eq!(
            parse_header(&[b'a'; 10]),
            Err(ParseError::Truncated { needed: HASH_LEN })
        );
    }

    #[test]
    fn written_requests_parse_back() {
        let addr = AddressRef {
            host: HostRef::Domain("example.org"),
            port: 443,
        };
        let mut buf = BytesMut::new();
        write_vless_request(&mut buf, &UUID, &addr, b"hi").unwrap();
        let h = parse_vless(&buf).unwrap();
        assert_eq!(h.address, addr);
        assert_eq!(h.payload, b"hi");

        let mut buf = BytesMut::new();
        assert_eq!(
            write_trojan_request(&mut buf, b"short", b""),
            Err(WriteError::InvalidHashLen)
        );
    }
}
