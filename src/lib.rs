pub mod errors;
pub mod ip;
pub mod link;
pub mod router;
pub mod stream;
pub mod tcp;

// -- Re-export the top-level components --

pub use router::Router;
pub use stream::{ByteStream, Reassembler};
pub use tcp::{TcpReceiver, TcpSender};
