//! Announcement wire format for lancast peer discovery.
//!
//! An announcement is a single UDP datagram carrying one address:
//!
//! ```text
//! byte 0:     family tag, 4 (IPv4) or 6 (IPv6)
//! bytes 1..N: raw address in network byte order, N = 4 or 16
//! ```
//!
//! Total length is exactly 5 or 17 bytes; anything else is malformed.
//! Decode failures are expected in the wild (foreign traffic on the group)
//! and must be recoverable, so [`decode`] reports a [`DecodeError`] rather
//! than panicking.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use thiserror::Error;

/// Family tag for an IPv4 announcement.
pub const TAG_IPV4: u8 = 4;

/// Family tag for an IPv6 announcement.
pub const TAG_IPV6: u8 = 6;

/// The largest possible announcement: tag byte plus a 16-byte IPv6 address.
pub const MAX_ANNOUNCEMENT_LEN: usize = 17;

/// Errors that can occur while decoding an announcement.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// The datagram was empty.
    #[error("empty announcement")]
    Empty,

    /// The family tag was neither 4 nor 6.
    #[error("unknown family tag {0}")]
    UnknownTag(u8),

    /// The payload length did not match the tagged family.
    #[error("bad announcement length: expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

/// Encode an address as an announcement datagram.
pub fn encode(addr: IpAddr) -> Vec<u8> {
    match addr {
        IpAddr::V4(v4) => {
            let mut buf = Vec::with_capacity(5);
            buf.push(TAG_IPV4);
            buf.extend_from_slice(&v4.octets());
            buf
        }
        IpAddr::V6(v6) => {
            let mut buf = Vec::with_capacity(MAX_ANNOUNCEMENT_LEN);
            buf.push(TAG_IPV6);
            buf.extend_from_slice(&v6.octets());
            buf
        }
    }
}

/// Decode an announcement datagram into an address.
///
/// The tag is validated before the payload is interpreted, and the total
/// length must be exactly what the tag implies.
pub fn decode(data: &[u8]) -> Result<IpAddr, DecodeError> {
    let (&tag, raw) = data.split_first().ok_or(DecodeError::Empty)?;

    match tag {
        TAG_IPV4 => {
            let octets: [u8; 4] = raw.try_into().map_err(|_| DecodeError::Length {
                expected: 5,
                actual: data.len(),
            })?;
            Ok(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        TAG_IPV6 => {
            let octets: [u8; 16] = raw.try_into().map_err(|_| DecodeError::Length {
                expected: MAX_ANNOUNCEMENT_LEN,
                actual: data.len(),
            })?;
            Ok(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        other => Err(DecodeError::UnknownTag(other)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_ipv4() {
        let bytes = encode("10.0.0.5".parse().unwrap());
        assert_eq!(bytes, vec![4, 10, 0, 0, 5]);
    }

    #[test]
    fn test_encode_ipv6() {
        let bytes = encode("fe80::1".parse().unwrap());
        assert_eq!(bytes.len(), 17);
        assert_eq!(bytes[0], 6);
        assert_eq!(&bytes[1..3], &[0xfe, 0x80]);
        assert_eq!(bytes[16], 1);
    }

    #[test]
    fn test_roundtrip() {
        let addrs: Vec<IpAddr> = vec![
            "0.0.0.0".parse().unwrap(),
            "10.0.0.5".parse().unwrap(),
            "255.255.255.255".parse().unwrap(),
            "::".parse().unwrap(),
            "fe80::c0ff:eeff:fe00:1".parse().unwrap(),
            "ff02::e74f:5353".parse().unwrap(),
        ];
        for addr in addrs {
            assert_eq!(decode(&encode(addr)), Ok(addr));
        }
    }

    #[test]
    fn test_decode_empty() {
        assert_eq!(decode(&[]), Err(DecodeError::Empty));
    }

    #[test]
    fn test_decode_unknown_tag() {
        assert_eq!(decode(&[0, 1, 2, 3, 4]), Err(DecodeError::UnknownTag(0)));
        assert_eq!(decode(&[5, 1, 2, 3, 4]), Err(DecodeError::UnknownTag(5)));
        // ASCII digits are not valid tags either
        assert_eq!(decode(b"4abcd"), Err(DecodeError::UnknownTag(b'4')));
    }

    #[test]
    fn test_decode_length_mismatch() {
        // v4 tag with too few and too many bytes
        assert_eq!(
            decode(&[4, 1, 2, 3]),
            Err(DecodeError::Length {
                expected: 5,
                actual: 4
            })
        );
        assert_eq!(
            decode(&[4, 1, 2, 3, 4, 5]),
            Err(DecodeError::Length {
                expected: 5,
                actual: 6
            })
        );
        // v6 tag with a v4-sized payload
        assert_eq!(
            decode(&[6, 1, 2, 3, 4]),
            Err(DecodeError::Length {
                expected: 17,
                actual: 5
            })
        );
        // tag alone
        assert_eq!(
            decode(&[6]),
            Err(DecodeError::Length {
                expected: 17,
                actual: 1
            })
        );
    }
}
