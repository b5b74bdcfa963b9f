use crate::ip::datagram::Ipv4Datagram;
use crate::link::arp::ArpMessage;
use crate::link::ethernet::{EthernetFrame, MacAddr, ETHERTYPE_ARP, ETHERTYPE_IPV4};
use std::collections::{HashMap, VecDeque};
use std::net::Ipv4Addr;
use tracing::debug;

/// How long a learned mapping stays usable
const MAPPING_VALID_MS: u64 = 30_000;
/// How long an unanswered ARP request waits before being repeated
const ARP_RETRY_MS: u64 = 5_000;

/// Resolution state for one next-hop address. An address we know
/// nothing about has no entry at all.
#[derive(Debug)]
enum ArpEntry {
    /// Request broadcast, reply not yet seen; datagrams park here in
    /// arrival order
    Waiting {
        elapsed_ms: u64,
        queued: VecDeque<Ipv4Datagram>,
    },
    /// Mapping learned and still fresh
    Valid { mac: MacAddr, elapsed_ms: u64 },
}

/// Connects the internet layer to the link layer: turns outbound IPv4
/// datagrams into Ethernet frames (resolving next hops over ARP) and
/// hands inbound IPv4 payloads back up the stack.
#[derive(Debug)]
pub struct NetworkInterface {
    mac: MacAddr,
    ip: Ipv4Addr,
    frames_out: VecDeque<EthernetFrame>,
    arp_cache: HashMap<Ipv4Addr, ArpEntry>,
}

impl NetworkInterface {
    pub fn new(mac: MacAddr, ip: Ipv4Addr) -> Self {
        debug!(%mac, %ip, "network interface up");
        NetworkInterface {
            mac,
            ip,
            frames_out: VecDeque::new(),
            arp_cache: HashMap::new(),
        }
    }

    pub fn mac(&self) -> MacAddr {
        self.mac
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.ip
    }

    /// Send `dgram` toward `next_hop`, resolving its hardware address
    /// first if necessary. Datagrams for an unresolved hop are queued
    /// and flushed when the mapping arrives.
    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        match self.arp_cache.get_mut(&next_hop) {
            Some(ArpEntry::Valid { mac, .. }) => {
                let dst = *mac;
                self.push_ipv4_frame(dst, &dgram);
            }
            Some(ArpEntry::Waiting { queued, .. }) => {
                queued.push_back(dgram);
            }
            None => {
                self.send_arp_request(next_hop);
                let mut queued = VecDeque::new();
                queued.push_back(dgram);
                self.arp_cache.insert(
                    next_hop,
                    ArpEntry::Waiting {
                        elapsed_ms: 0,
                        queued,
                    },
                );
            }
        }
    }

    /// Process one inbound frame; IPv4 payloads come back to the caller.
    ///
    /// The hardware destination must be us (or broadcast, for ARP). The
    /// IP destination of a returned datagram may be some other host:
    /// when this interface belongs to a router, forwarding is the
    /// caller's job.
    pub fn recv_frame(&mut self, frame: &EthernetFrame) -> Option<Ipv4Datagram> {
        match frame.header.ethertype {
            ETHERTYPE_ARP => {
                if frame.header.dst != self.mac && frame.header.dst != MacAddr::BROADCAST {
                    return None;
                }
                let arp = ArpMessage::parse(&frame.payload).ok()?;
                if arp.target_ip != self.ip {
                    return None;
                }
                match arp.opcode {
                    ArpMessage::OPCODE_REQUEST => {
                        let reply = ArpMessage::reply(self.mac, self.ip, arp.sender_mac, arp.sender_ip);
                        self.frames_out.push_back(EthernetFrame::new(
                            frame.header.src,
                            self.mac,
                            ETHERTYPE_ARP,
                            reply.serialize(),
                        ));
                        // A request teaches us the asker's mapping too
                        self.learn_mapping(arp.sender_ip, arp.sender_mac);
                    }
                    ArpMessage::OPCODE_REPLY => {
                        self.learn_mapping(arp.sender_ip, arp.sender_mac);
                    }
                    _ => {}
                }
                None
            }
            ETHERTYPE_IPV4 => {
                if frame.header.dst != self.mac {
                    return None;
                }
                Ipv4Datagram::parse(&frame.payload).ok()
            }
            _ => None,
        }
    }

    /// Advance the ARP cache clocks: expire stale mappings, repeat
    /// unanswered requests.
    pub fn tick(&mut self, ms: u64) {
        let mut expired = Vec::new();
        let mut retry = Vec::new();

        for (&ip, entry) in self.arp_cache.iter_mut() {
            match entry {
                ArpEntry::Valid { elapsed_ms, .. } => {
                    *elapsed_ms += ms;
                    if *elapsed_ms > MAPPING_VALID_MS {
                        expired.push(ip);
                    }
                }
                ArpEntry::Waiting { elapsed_ms, .. } => {
                    *elapsed_ms += ms;
                    if *elapsed_ms > ARP_RETRY_MS {
                        *elapsed_ms = 0;
                        retry.push(ip);
                    }
                }
            }
        }

        for ip in expired {
            self.arp_cache.remove(&ip);
        }
        for ip in retry {
            self.send_arp_request(ip);
        }
    }

    /// Pop one frame awaiting transmission, if any
    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.frames_out.pop_front()
    }

    fn push_ipv4_frame(&mut self, dst: MacAddr, dgram: &Ipv4Datagram) {
        let Ok(payload) = dgram.serialize() else {
            return; // unencodable datagrams are dropped
        };
        self.frames_out
            .push_back(EthernetFrame::new(dst, self.mac, ETHERTYPE_IPV4, payload));
    }

    fn send_arp_request(&mut self, next_hop: Ipv4Addr) {
        let arp = ArpMessage::request(self.mac, self.ip, next_hop);
        self.frames_out.push_back(EthernetFrame::new(
            MacAddr::BROADCAST,
            self.mac,
            ETHERTYPE_ARP,
            arp.serialize(),
        ));
    }

    fn learn_mapping(&mut self, ip: Ipv4Addr, mac: MacAddr) {
        debug!(%ip, %mac, "learned mapping");
        let previous = self.arp_cache.insert(
            ip,
            ArpEntry::Valid {
                mac,
                elapsed_ms: 0,
            },
        );

        // Waiting -> Valid releases the parked datagrams, in order
        if let Some(ArpEntry::Waiting { queued, .. }) = previous {
            for dgram in queued {
                self.send_datagram(dgram, ip);
            }
        }
    }
}

// -- Unit tests --
