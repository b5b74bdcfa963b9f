use crate::errors::HeaderError;
use crate::ip::ip_flags::IpFlags;
use std::net::Ipv4Addr;

pub const IPV4_HEADER_LEN: usize = 20;

/// RFC 791 fixed header. Options are not supported; the IHL is always 5.
#[derive(Debug, Clone, PartialEq)]
pub struct Ipv4Header {
    pub version: u8, // Always 4
    pub ihl: u8,     // Always 5 since we carry no options
    pub tos: u8,
    pub total_len: u16,
    pub id: u16,
    pub flags: IpFlags,   // 3 bits, part of u16
    pub frag_offset: u16, // 13 bits, part of u16
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,
}

impl Ipv4Header {
    /// Serialize an `Ipv4Header` into a byte array of size 20, computing
    /// the checksum fresh.
    pub fn serialize(&self, buf: &mut [u8]) -> Result<usize, HeaderError> {
        if buf.len() < IPV4_HEADER_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: IPV4_HEADER_LEN,
                found: buf.len(),
            });
        }

        buf[0] = (self.version << 4) | self.ihl;
        buf[1] = self.tos;
        buf[2..4].copy_from_slice(&self.total_len.to_be_bytes());
        buf[4..6].copy_from_slice(&self.id.to_be_bytes());
        let flags = self.flags.pack(self.frag_offset);
        buf[6..8].copy_from_slice(&flags.to_be_bytes());
        buf[8] = self.ttl;
        buf[9] = self.protocol;
        buf[10..12].fill(0); // Set checksum to 0 initially
        buf[12..16].copy_from_slice(&self.src_ip.octets());
        buf[16..20].copy_from_slice(&self.dst_ip.octets());

        let checksum = Self::checksum(&buf[0..IPV4_HEADER_LEN]);
        buf[10..12].copy_from_slice(&checksum.to_be_bytes());

        Ok(IPV4_HEADER_LEN)
    }

    /// Parse a byte slice into an `Ipv4Header`, verifying the checksum
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < IPV4_HEADER_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: IPV4_HEADER_LEN,
                found: buf.len(),
            });
        }

        if Self::checksum(&buf[0..IPV4_HEADER_LEN]) != 0 {
            return Err(HeaderError::BadChecksum("IP".to_string()));
        };

        let version = buf[0] >> 4;
        let ihl = buf[0] & 0x0f;
        if version != 4 {
            return Err(HeaderError::Unsupported("IP version".to_string()));
        }
        if ihl != 5 {
            return Err(HeaderError::Unsupported("IP options".to_string()));
        }

        let tos = buf[1];
        let total_len = u16::from_be_bytes([buf[2], buf[3]]);
        let id = u16::from_be_bytes([buf[4], buf[5]]);
        let combo_flags = u16::from_be_bytes([buf[6], buf[7]]);
        let (flags, frag_offset) = IpFlags::unpack(combo_flags);
        let ttl = buf[8];
        let protocol = buf[9];
        let checksum = u16::from_be_bytes([buf[10], buf[11]]);
        let src_ip = Ipv4Addr::new(buf[12], buf[13], buf[14], buf[15]);
        let dst_ip = Ipv4Addr::new(buf[16], buf[17], buf[18], buf[19]);

        Ok(Ipv4Header {
            version,
            ihl,
            tos,
            total_len,
            id,
            flags,
            frag_offset,
            ttl,
            protocol,
            checksum,
            src_ip,
            dst_ip,
        })
    }

    /// Compute the internet checksum over a serialized header.
    /// Wiki: https://en.wikipedia.org/wiki/IPv4_header_checksum.
    pub fn checksum(data: &[u8]) -> u16 {
        // Sum every 2 bytes as a 16-bit value
        let sum: u32 = data
            .chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]) as u32)
            .sum();

        // Fold the carry bits
        let folded = (sum & 0xffff) + (sum >> 16);
        !(folded as u16)
    }
}

impl Default for Ipv4Header {
    fn default() -> Self {
        Ipv4Header {
            version: 4,
            ihl: 5,
            tos: 0,
            total_len: 0,
            id: 0,
            flags: IpFlags::DF,
            frag_offset: 0,
            ttl: 64,
            protocol: 0,
            checksum: 0,
            src_ip: Ipv4Addr::new(0, 0, 0, 0),
            dst_ip: Ipv4Addr::new(0, 0, 0, 0),
        }
    }
}

// -- Unit tests --
