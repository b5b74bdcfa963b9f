pub mod arp;
pub mod ethernet;
pub mod interface;

// -- Re-export public structs --

pub use arp::ArpMessage;
pub use ethernet::{EthernetFrame, EthernetHeader, MacAddr};
pub use interface::NetworkInterface;
