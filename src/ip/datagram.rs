use crate::errors::HeaderError;
use crate::ip::ip_header::{Ipv4Header, IPV4_HEADER_LEN};

/// An IPv4 datagram: header plus opaque payload
#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Datagram {
    pub header: Ipv4Header,
    pub payload: Vec<u8>,
}

impl Ipv4Datagram {
    pub fn new(header: Ipv4Header, payload: Vec<u8>) -> Self {
        Ipv4Datagram { header, payload }
    }

    /// Serialize into wire bytes, fixing up `total_len` and the header
    /// checksum along the way.
    pub fn serialize(&self) -> Result<Vec<u8>, HeaderError> {
        let total_len = IPV4_HEADER_LEN + self.payload.len();
        if total_len > u16::MAX as usize {
            return Err(HeaderError::Unsupported("oversized datagram".to_string()));
        }

        let mut header = self.header.clone();
        header.total_len = total_len as u16;

        let mut buf = vec![0u8; total_len];
        header.serialize(&mut buf[..IPV4_HEADER_LEN])?;
        buf[IPV4_HEADER_LEN..].copy_from_slice(&self.payload);
        Ok(buf)
    }

    /// Parse wire bytes, honoring the header's `total_len` and dropping
    /// any trailing link-layer padding.
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        let header = Ipv4Header::parse(buf)?;

        let total_len = header.total_len as usize;
        if total_len < IPV4_HEADER_LEN || buf.len() < total_len {
            return Err(HeaderError::BufferTooSmall {
                expected: total_len.max(IPV4_HEADER_LEN),
                found: buf.len(),
            });
        }

        let payload = buf[IPV4_HEADER_LEN..total_len].to_vec();
        Ok(Ipv4Datagram { header, payload })
    }
}

// -- Unit tests --
