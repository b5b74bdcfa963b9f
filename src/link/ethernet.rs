use crate::errors::HeaderError;
use std::fmt;

/// EtherType value for IPv4 frames
pub const ETHERTYPE_IPV4: u16 = 0x0800;
/// EtherType value for ARP frames
pub const ETHERTYPE_ARP: u16 = 0x0806;

pub const ETHERNET_HEADER_LEN: usize = 14;

/// A 48-bit Ethernet hardware address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    /// The all-ones broadcast address
    pub const BROADCAST: MacAddr = MacAddr([0xff; 6]);
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// IEEE 802.3 (Ethernet II) frame header
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EthernetHeader {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Serialize the header into the first 14 bytes of `buf`
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, HeaderError> {
        if buf.len() < ETHERNET_HEADER_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: ETHERNET_HEADER_LEN,
                found: buf.len(),
            });
        }

        buf[0..6].copy_from_slice(&self.dst.0);
        buf[6..12].copy_from_slice(&self.src.0);
        buf[12..14].copy_from_slice(&self.ethertype.to_be_bytes());

        Ok(ETHERNET_HEADER_LEN)
    }

    /// Parse the first 14 bytes of `buf` into a header
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < ETHERNET_HEADER_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: ETHERNET_HEADER_LEN,
                found: buf.len(),
            });
        }

        let mut dst = [0u8; 6];
        let mut src = [0u8; 6];
        dst.copy_from_slice(&buf[0..6]);
        src.copy_from_slice(&buf[6..12]);
        let ethertype = u16::from_be_bytes([buf[12], buf[13]]);

        Ok(EthernetHeader {
            dst: MacAddr(dst),
            src: MacAddr(src),
            ethertype,
        })
    }
}

/// An Ethernet frame: header plus opaque payload
#[derive(Debug, Clone, PartialEq)]
pub struct EthernetFrame {
    pub header: EthernetHeader,
    pub payload: Vec<u8>,
}

impl EthernetFrame {
    pub fn new(dst: MacAddr, src: MacAddr, ethertype: u16, payload: Vec<u8>) -> Self {
        EthernetFrame {
            header: EthernetHeader {
                dst,
                src,
                ethertype,
            },
            payload,
        }
    }

    /// Serialize into wire bytes
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(ETHERNET_HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.header.dst.0);
        buf.extend_from_slice(&self.header.src.0);
        buf.extend_from_slice(&self.header.ethertype.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse wire bytes into a frame
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        let header = EthernetHeader::parse(buf)?;
        Ok(EthernetFrame {
            header,
            payload: buf[ETHERNET_HEADER_LEN..].to_vec(),
        })
    }
}

// -- Unit tests --
