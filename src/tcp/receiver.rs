use crate::stream::{ByteStream, Reassembler};
use crate::tcp::messages::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::wrap32::Wrap32;

/// The receiving side of a TCP connection: unwraps segment sequence
/// numbers against the peer's ISN, drives the reassembler, and reports
/// the ackno and window back to the peer.
#[derive(Debug)]
pub struct TcpReceiver {
    reassembler: Reassembler,
    zero_point: Option<Wrap32>, // peer's ISN, latched by the first SYN
    ackno: Option<Wrap32>,
    fin_end: Option<u64>, // absolute stream index one past the FIN's payload
}

impl TcpReceiver {
    pub fn new(capacity: usize) -> Self {
        TcpReceiver {
            reassembler: Reassembler::new(ByteStream::new(capacity)),
            zero_point: None,
            ackno: None,
            fin_end: None,
        }
    }

    /// Process one inbound segment. Segments arriving before the SYN
    /// are ignored.
    pub fn receive(&mut self, message: TcpSenderMessage) {
        if message.syn && self.zero_point.is_none() {
            self.zero_point = Some(message.seqno);
        }
        let Some(zero_point) = self.zero_point else {
            return;
        };

        let abs_seqno = message
            .seqno
            .unwrap(zero_point, self.reassembler.first_unassembled());

        // The SYN occupies sequence slot zero, so stream indices sit one
        // below absolute seqnos. A non-SYN segment claiming slot zero is
        // nonsense and gets dropped.
        let first_index = if message.syn {
            abs_seqno
        } else {
            match abs_seqno.checked_sub(1) {
                Some(index) => index,
                None => return,
            }
        };

        self.reassembler
            .insert(first_index, &message.payload, message.fin);

        if message.fin {
            self.fin_end = Some(first_index + message.payload.len() as u64);
        }

        let mut ackno = Wrap32::wrap(self.reassembler.first_unassembled() + 1, zero_point);
        if self.fin_end == Some(self.reassembler.first_unassembled()) {
            // Everything up to the FIN is assembled; ack its slot too
            ackno = ackno + 1;
        }
        self.ackno = Some(ackno);
    }

    /// The acknowledgment and window advertisement for the peer
    pub fn send(&self) -> TcpReceiverMessage {
        let window_size = self
            .reassembler
            .output()
            .available_capacity()
            .min(u16::MAX as usize) as u16;
        TcpReceiverMessage {
            ackno: self.ackno,
            window_size,
        }
    }

    /// Bytes buffered out of order, awaiting assembly
    pub fn bytes_pending(&self) -> u64 {
        self.reassembler.bytes_pending()
    }

    /// The assembled inbound stream
    pub fn reader(&self) -> &ByteStream {
        self.reassembler.output()
    }

    /// Mutable access to the inbound stream, for popping assembled bytes
    pub fn reader_mut(&mut self) -> &mut ByteStream {
        self.reassembler.output_mut()
    }
}

// -- Unit tests --
