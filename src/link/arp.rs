use crate::errors::HeaderError;
use crate::link::ethernet::MacAddr;
use std::net::Ipv4Addr;

pub const ARP_MESSAGE_LEN: usize = 28;

const HW_TYPE_ETHERNET: u16 = 1;
const PROTO_TYPE_IPV4: u16 = 0x0800;
const HW_ADDR_LEN: u8 = 6;
const PROTO_ADDR_LEN: u8 = 4;

/// RFC 826 ARP message body for the Ethernet/IPv4 pairing
#[derive(Debug, Clone, PartialEq)]
pub struct ArpMessage {
    pub opcode: u16,
    pub sender_mac: MacAddr,
    pub sender_ip: Ipv4Addr,
    pub target_mac: MacAddr,
    pub target_ip: Ipv4Addr,
}

impl ArpMessage {
    pub const OPCODE_REQUEST: u16 = 1;
    pub const OPCODE_REPLY: u16 = 2;

    /// A who-has request; the target hardware address is left zeroed
    pub fn request(sender_mac: MacAddr, sender_ip: Ipv4Addr, target_ip: Ipv4Addr) -> Self {
        ArpMessage {
            opcode: Self::OPCODE_REQUEST,
            sender_mac,
            sender_ip,
            target_mac: MacAddr([0; 6]),
            target_ip,
        }
    }

    /// An is-at reply addressed to the original requester
    pub fn reply(
        sender_mac: MacAddr,
        sender_ip: Ipv4Addr,
        target_mac: MacAddr,
        target_ip: Ipv4Addr,
    ) -> Self {
        ArpMessage {
            opcode: Self::OPCODE_REPLY,
            sender_mac,
            sender_ip,
            target_mac,
            target_ip,
        }
    }

    /// Serialize into the fixed 28-byte wire form
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = vec![0u8; ARP_MESSAGE_LEN];

        buf[0..2].copy_from_slice(&HW_TYPE_ETHERNET.to_be_bytes());
        buf[2..4].copy_from_slice(&PROTO_TYPE_IPV4.to_be_bytes());
        buf[4] = HW_ADDR_LEN;
        buf[5] = PROTO_ADDR_LEN;
        buf[6..8].copy_from_slice(&self.opcode.to_be_bytes());
        buf[8..14].copy_from_slice(&self.sender_mac.0);
        buf[14..18].copy_from_slice(&self.sender_ip.octets());
        buf[18..24].copy_from_slice(&self.target_mac.0);
        buf[24..28].copy_from_slice(&self.target_ip.octets());

        buf
    }

    /// Parse the wire form, rejecting anything but Ethernet/IPv4
    pub fn parse(buf: &[u8]) -> Result<Self, HeaderError> {
        if buf.len() < ARP_MESSAGE_LEN {
            return Err(HeaderError::BufferTooSmall {
                expected: ARP_MESSAGE_LEN,
                found: buf.len(),
            });
        }

        let hw_type = u16::from_be_bytes([buf[0], buf[1]]);
        let proto_type = u16::from_be_bytes([buf[2], buf[3]]);
        if hw_type != HW_TYPE_ETHERNET
            || proto_type != PROTO_TYPE_IPV4
            || buf[4] != HW_ADDR_LEN
            || buf[5] != PROTO_ADDR_LEN
        {
            return Err(HeaderError::Unsupported("ARP address types".to_string()));
        }

        let opcode = u16::from_be_bytes([buf[6], buf[7]]);
        let mut sender_mac = [0u8; 6];
        let mut target_mac = [0u8; 6];
        sender_mac.copy_from_slice(&buf[8..14]);
        target_mac.copy_from_slice(&buf[18..24]);
        let sender_ip = Ipv4Addr::new(buf[14], buf[15], buf[16], buf[17]);
        let target_ip = Ipv4Addr::new(buf[24], buf[25], buf[26], buf[27]);

        Ok(ArpMessage {
            opcode,
            sender_mac: MacAddr(sender_mac),
            sender_ip,
            target_mac: MacAddr(target_mac),
            target_ip,
        })
    }
}

// -- Unit tests --
