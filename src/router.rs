use crate::ip::datagram::Ipv4Datagram;
use crate::link::ethernet::{EthernetFrame, MacAddr};
use crate::link::interface::NetworkInterface;
use std::collections::VecDeque;
use std::net::Ipv4Addr;
use tracing::{debug, trace};

/// A `NetworkInterface` whose received datagrams are parked in a queue
/// for the owner to drain, instead of being handed back synchronously
#[derive(Debug)]
pub struct AsyncNetworkInterface {
    interface: NetworkInterface,
    datagrams_in: VecDeque<Ipv4Datagram>,
}

impl AsyncNetworkInterface {
    pub fn new(interface: NetworkInterface) -> Self {
        AsyncNetworkInterface {
            interface,
            datagrams_in: VecDeque::new(),
        }
    }

    /// Process one inbound frame; IPv4 payloads are queued for
    /// `maybe_receive`
    pub fn recv_frame(&mut self, frame: &EthernetFrame) {
        if let Some(dgram) = self.interface.recv_frame(frame) {
            self.datagrams_in.push_back(dgram);
        }
    }

    /// Pop one queued inbound datagram, if any
    pub fn maybe_receive(&mut self) -> Option<Ipv4Datagram> {
        self.datagrams_in.pop_front()
    }

    // -- Pass-throughs to the synchronous interface --

    pub fn send_datagram(&mut self, dgram: Ipv4Datagram, next_hop: Ipv4Addr) {
        self.interface.send_datagram(dgram, next_hop);
    }

    pub fn maybe_send(&mut self) -> Option<EthernetFrame> {
        self.interface.maybe_send()
    }

    pub fn tick(&mut self, ms: u64) {
        self.interface.tick(ms);
    }

    pub fn mac(&self) -> MacAddr {
        self.interface.mac()
    }

    pub fn ip(&self) -> Ipv4Addr {
        self.interface.ip()
    }
}

/// A forwarding rule: datagrams whose destination matches the top
/// `prefix_len` bits of `prefix` leave through `interface_idx`, toward
/// `next_hop` (or straight to the destination when directly attached)
#[derive(Debug, Clone)]
struct Route {
    prefix: Ipv4Addr,
    prefix_len: u8,
    next_hop: Option<Ipv4Addr>,
    interface_idx: usize,
}

impl Route {
    fn matches(&self, dst: u32) -> bool {
        let mask = if self.prefix_len == 0 {
            0
        } else {
            u32::MAX << (32 - self.prefix_len)
        };
        (u32::from(self.prefix) & mask) == (dst & mask)
    }
}

/// Routes IPv4 datagrams between network interfaces by longest-prefix
/// match over a static route table
#[derive(Debug, Default)]
pub struct Router {
    interfaces: Vec<AsyncNetworkInterface>,
    routes: Vec<Route>,
}

impl Router {
    pub fn new() -> Self {
        Router::default()
    }

    /// Attach an interface; returns its index for use in routes
    pub fn add_interface(&mut self, interface: AsyncNetworkInterface) -> usize {
        self.interfaces.push(interface);
        self.interfaces.len() - 1
    }

    pub fn interface_mut(&mut self, idx: usize) -> &mut AsyncNetworkInterface {
        &mut self.interfaces[idx]
    }

    /// Append a forwarding rule. Among equal prefix lengths the rule
    /// added first wins.
    pub fn add_route(
        &mut self,
        prefix: Ipv4Addr,
        prefix_len: u8,
        next_hop: Option<Ipv4Addr>,
        interface_idx: usize,
    ) {
        debug!(%prefix, prefix_len, ?next_hop, interface_idx, "adding route");
        self.routes.push(Route {
            prefix,
            prefix_len,
            next_hop,
            interface_idx,
        });
    }

    /// Drain every interface's inbound queue and forward each datagram
    /// per the route table
    pub fn route(&mut self) {
        for i in 0..self.interfaces.len() {
            while let Some(dgram) = self.interfaces[i].maybe_receive() {
                self.route_datagram(dgram);
            }
        }
    }

    fn route_datagram(&mut self, mut dgram: Ipv4Datagram) {
        if dgram.header.ttl <= 1 {
            return; // hop limit spent
        }

        let dst = u32::from(dgram.header.dst_ip);
        let mut best: Option<&Route> = None;
        for route in &self.routes {
            if best.map_or(true, |b| route.prefix_len > b.prefix_len) && route.matches(dst) {
                best = Some(route);
            }
        }

        let Some(route) = best else {
            trace!(dst = %dgram.header.dst_ip, "no route");
            return;
        };
        let interface_idx = route.interface_idx;
        let next_hop = route.next_hop.unwrap_or(dgram.header.dst_ip);

        dgram.header.ttl -= 1;
        self.interfaces[interface_idx].send_datagram(dgram, next_hop);
    }
}

// -- Unit tests --
