use crate::tcp::wrap32::Wrap32;

/// What the sending side of a connection tells the receiving side:
/// sequence number, SYN/FIN flags, and payload
#[derive(Debug, Clone, PartialEq)]
pub struct TcpSenderMessage {
    pub seqno: Wrap32,
    pub syn: bool,
    pub payload: Vec<u8>,
    pub fin: bool,
}

impl TcpSenderMessage {
    /// A message at `seqno` carrying no flags and no payload
    pub fn empty(seqno: Wrap32) -> Self {
        TcpSenderMessage {
            seqno,
            syn: false,
            payload: Vec::new(),
            fin: false,
        }
    }

    /// Sequence space consumed: SYN and FIN each occupy one slot
    pub fn sequence_length(&self) -> u64 {
        self.syn as u64 + self.payload.len() as u64 + self.fin as u64
    }
}

/// What the receiving side tells the sending side: the ackno (absent
/// until a SYN has been seen) and the advertised window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TcpReceiverMessage {
    pub ackno: Option<Wrap32>,
    pub window_size: u16,
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_length() {
        let mut msg = TcpSenderMessage::empty(Wrap32::new(0));
        assert_eq!(msg.sequence_length(), 0);

        msg.payload = b"hello".to_vec();
        assert_eq!(msg.sequence_length(), 5);

        msg.syn = true;
        msg.fin = true;
        assert_eq!(msg.sequence_length(), 7);
    }
}
