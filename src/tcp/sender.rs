use crate::stream::ByteStream;
use crate::tcp::config::MAX_PAYLOAD_SIZE;
use crate::tcp::messages::{TcpReceiverMessage, TcpSenderMessage};
use crate::tcp::wrap32::Wrap32;
use std::collections::VecDeque;

/// Retransmission timer with caller-driven exponential backoff
#[derive(Debug)]
struct RetransmissionTimer {
    rto_ms: u64,
    elapsed_ms: u64,
    armed: bool,
}

impl RetransmissionTimer {
    fn new(rto_ms: u64) -> Self {
        RetransmissionTimer {
            rto_ms,
            elapsed_ms: 0,
            armed: false,
        }
    }

    fn start(&mut self) {
        self.elapsed_ms = 0;
        self.armed = true;
    }

    fn stop(&mut self) {
        self.armed = false;
    }

    fn is_armed(&self) -> bool {
        self.armed
    }

    fn expired(&self) -> bool {
        self.elapsed_ms >= self.rto_ms
    }

    fn advance(&mut self, ms: u64) {
        self.elapsed_ms += ms;
    }

    fn set_rto(&mut self, rto_ms: u64) {
        self.rto_ms = rto_ms;
    }

    fn double_rto(&mut self) {
        self.rto_ms <<= 1;
    }
}

/// The sending side of a TCP connection.
///
/// Reads from its outbound `ByteStream`, slices the bytes into segments
/// that fit the peer's advertised window, and retransmits the oldest
/// outstanding segment when the timer fires. Sequence bookkeeping is
/// absolute (`u64`); values are wrapped only at the message boundary.
#[derive(Debug)]
pub struct TcpSender {
    isn: Wrap32,
    initial_rto_ms: u64,
    outbound: ByteStream,
    pending_out: VecDeque<TcpSenderMessage>, // built but not yet handed to the wire
    outstanding: VecDeque<TcpSenderMessage>, // sent and awaiting acknowledgment
    ackno_abs: u64,
    next_seqno_abs: u64,
    window_size: u64,
    nonzero_window: bool,
    syn_sent: bool,
    fin_sent: bool,
    in_flight: u64,
    consecutive_retx: u64,
    timer: RetransmissionTimer,
}

impl TcpSender {
    /// New sender with the given outbound stream capacity and initial
    /// retransmission timeout. A random ISN is chosen unless one is
    /// supplied.
    pub fn new(capacity: usize, initial_rto_ms: u64, isn: Option<Wrap32>) -> Self {
        TcpSender {
            isn: isn.unwrap_or_else(|| Wrap32::new(rand::random())),
            initial_rto_ms,
            outbound: ByteStream::new(capacity),
            pending_out: VecDeque::new(),
            outstanding: VecDeque::new(),
            ackno_abs: 0,
            next_seqno_abs: 0,
            window_size: 1, // a peer we haven't heard from gets one probe slot
            nonzero_window: true,
            syn_sent: false,
            fin_sent: false,
            in_flight: 0,
            consecutive_retx: 0,
            timer: RetransmissionTimer::new(initial_rto_ms),
        }
    }

    /// The application side of the outbound stream
    pub fn writer(&self) -> &ByteStream {
        &self.outbound
    }

    pub fn writer_mut(&mut self) -> &mut ByteStream {
        &mut self.outbound
    }

    /// Slice buffered outbound bytes into segments, up to the window
    pub fn push(&mut self) {
        if self.window_size == 0 && self.ackno_abs == self.next_seqno_abs {
            // Zero-window probe: behave as if the peer advertised one slot
            self.window_size = 1;
        }

        let mut budget = self
            .window_size
            .saturating_sub(!self.syn_sent as u64)
            .min(self.outbound.bytes_buffered() as u64);

        while budget > 0 || !self.syn_sent {
            let payload_len = budget.min(MAX_PAYLOAD_SIZE as u64) as usize;
            let mut payload = Vec::with_capacity(payload_len);
            while payload.len() < payload_len {
                let taken = {
                    let run = self.outbound.peek();
                    let take = run.len().min(payload_len - payload.len());
                    payload.extend_from_slice(&run[..take]);
                    take
                };
                self.outbound.pop(taken);
            }

            let syn = !self.syn_sent;
            // FIN rides along only if the window has a slot left for it
            let fin = !self.fin_sent
                && self.outbound.is_finished()
                && self.window_size > payload.len() as u64 + syn as u64;

            let message = TcpSenderMessage {
                seqno: Wrap32::wrap(self.next_seqno_abs, self.isn),
                syn,
                payload,
                fin,
            };
            let seq_len = message.sequence_length();

            self.syn_sent = true;
            self.fin_sent |= fin;
            self.next_seqno_abs += seq_len;
            self.in_flight += seq_len;
            self.window_size -= seq_len;
            budget -= payload_len as u64;
            self.pending_out.push_back(message);
        }

        // Stream ended after the windowed payload ran out: a bare FIN
        // still fits if any window remains
        if self.outbound.is_finished() && self.window_size > 0 && !self.fin_sent {
            let message = TcpSenderMessage {
                seqno: Wrap32::wrap(self.next_seqno_abs, self.isn),
                syn: !self.syn_sent,
                payload: Vec::new(),
                fin: true,
            };
            let seq_len = message.sequence_length();

            self.syn_sent = true;
            self.fin_sent = true;
            self.next_seqno_abs += seq_len;
            self.in_flight += seq_len;
            self.window_size = self.window_size.saturating_sub(seq_len);
            self.pending_out.push_back(message);
        }
    }

    /// Hand the next built segment to the wire. First transmissions are
    /// recorded as outstanding; retransmissions pass straight through.
    pub fn maybe_send(&mut self) -> Option<TcpSenderMessage> {
        let message = self.pending_out.pop_front()?;

        let is_new = match self.outstanding.back() {
            Some(back) => {
                message.seqno.unwrap(self.isn, self.next_seqno_abs)
                    > back.seqno.unwrap(self.isn, self.next_seqno_abs)
            }
            None => true,
        };
        if is_new {
            self.outstanding.push_back(message.clone());
        }

        if !self.timer.is_armed() {
            self.timer.start();
        }
        Some(message)
    }

    /// A flagless, payload-free segment at the next sequence number,
    /// for ACK-only replies
    pub fn send_empty_message(&self) -> TcpSenderMessage {
        TcpSenderMessage::empty(Wrap32::wrap(self.next_seqno_abs, self.isn))
    }

    /// Process an acknowledgment and window advertisement from the peer
    pub fn receive(&mut self, message: &TcpReceiverMessage) {
        let Some(ackno) = message.ackno else {
            // Pre-SYN the peer can still tell us its window
            if !self.syn_sent {
                self.window_size = message.window_size as u64;
            }
            return;
        };

        let ack_abs = ackno.unwrap(self.isn, self.ackno_abs);
        if ack_abs < self.ackno_abs || ack_abs > self.next_seqno_abs {
            return; // acks nothing we sent, or regresses
        }
        self.ackno_abs = ack_abs;

        // Usable window: advertised minus what is already in flight past
        // the ackno
        let remaining = (message.window_size as u64).saturating_sub(self.next_seqno_abs - ack_abs);
        self.window_size = remaining;
        self.nonzero_window = remaining > 0;

        let mut newly_acked = false;
        let mut front_abs = self.next_seqno_abs - self.in_flight;
        while let Some(front) = self.outstanding.front() {
            let seq_len = front.sequence_length();
            if ack_abs < front_abs + seq_len {
                break; // partially acked segments stay outstanding
            }
            front_abs += seq_len;
            self.in_flight -= seq_len;
            self.outstanding.pop_front();
            newly_acked = true;
        }

        self.timer.set_rto(self.initial_rto_ms);
        if newly_acked && !self.outstanding.is_empty() {
            self.timer.start();
            self.consecutive_retx = 0;
        } else if self.outstanding.is_empty() {
            self.timer.stop();
            self.consecutive_retx = 0;
        }
    }

    /// Advance the retransmission timer; on expiry, requeue the oldest
    /// outstanding segment
    pub fn tick(&mut self, ms: u64) {
        if !self.timer.is_armed() {
            return;
        }
        self.timer.advance(ms);
        if !self.timer.expired() {
            return;
        }

        if let Some(front) = self.outstanding.front() {
            self.pending_out.push_front(front.clone());
            if self.nonzero_window {
                // Zero-window probes keep the timer flat
                self.consecutive_retx += 1;
                self.timer.double_rto();
            }
            self.timer.start();
        }
    }

    /// Sequence numbers sent but not yet acknowledged
    pub fn sequence_numbers_in_flight(&self) -> u64 {
        self.in_flight
    }

    /// Timeouts fired since the last newly-acked segment
    pub fn consecutive_retransmissions(&self) -> u64 {
        self.consecutive_retx
    }

    /// The initial sequence number of this sender
    pub fn isn(&self) -> Wrap32 {
        self.isn
    }

    #[cfg(test)]
    fn timer_armed(&self) -> bool {
        self.timer.is_armed()
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;

    const RTO: u64 = 1000;

    fn sender(isn: u32) -> TcpSender {
        TcpSender::new(4096, RTO, Some(Wrap32::new(isn)))
    }

    fn ack(ackno: u32, window_size: u16) -> TcpReceiverMessage {
        TcpReceiverMessage {
            ackno: Some(Wrap32::new(ackno)),
            window_size,
        }
    }

    fn window_only(window_size: u16) -> TcpReceiverMessage {
        TcpReceiverMessage {
            ackno: None,
            window_size,
        }
    }

    #[test]
    fn test_first_push_sends_syn() {
        let mut tx = sender(100);

        tx.push();
        let msg = tx.maybe_send().unwrap();
        assert!(msg.syn);
        assert!(!msg.fin);
        assert!(msg.payload.is_empty());
        assert_eq!(msg.seqno, Wrap32::new(100));
        assert_eq!(tx.sequence_numbers_in_flight(), 1);

        // Nothing else to send, and pushing again emits no second SYN
        assert_eq!(tx.maybe_send(), None);
        tx.push();
        assert_eq!(tx.maybe_send(), None);
    }

    #[test]
    fn test_syn_payload_fin_in_one_segment() {
        let mut tx = sender(100);
        tx.receive(&window_only(10));

        tx.writer_mut().push(b"hi");
        tx.writer_mut().close();
        tx.push();

        let msg = tx.maybe_send().unwrap();
        assert!(msg.syn);
        assert_eq!(msg.payload, b"hi");
        assert!(msg.fin);
        assert_eq!(msg.seqno, Wrap32::new(100));
        assert_eq!(tx.sequence_numbers_in_flight(), 4);

        // Full ack: nothing in flight, timer disarmed
        tx.receive(&ack(104, 10));
        assert_eq!(tx.sequence_numbers_in_flight(), 0);
        assert!(!tx.timer_armed());
    }

    #[test]
    fn test_segments_capped_at_max_payload() {
        let mut tx = TcpSender::new(8192, RTO, Some(Wrap32::new(0)));
        tx.receive(&window_only(3000));

        tx.writer_mut().push(&vec![b'x'; 2000]);
        tx.push();

        let first = tx.maybe_send().unwrap();
        assert!(first.syn);
        assert_eq!(first.payload.len(), MAX_PAYLOAD_SIZE);

        let second = tx.maybe_send().unwrap();
        assert!(!second.syn);
        assert_eq!(second.payload.len(), 2000 - MAX_PAYLOAD_SIZE);
        assert_eq!(second.seqno, Wrap32::new(1 + MAX_PAYLOAD_SIZE as u32));

        assert_eq!(tx.maybe_send(), None);
    }

    #[test]
    fn test_window_limits_data() {
        let mut tx = sender(0);
        tx.receive(&window_only(5));

        tx.writer_mut().push(b"abcdefgh");
        tx.push();

        let msg = tx.maybe_send().unwrap();
        assert!(msg.syn);
        assert_eq!(msg.payload, b"abcd"); // SYN takes one of the five slots
        assert_eq!(tx.maybe_send(), None);

        // Window opens: the rest flows
        tx.receive(&ack(5, 5));
        tx.push();
        let msg = tx.maybe_send().unwrap();
        assert_eq!(msg.payload, b"efgh");
    }

    #[test]
    fn test_retransmission_backoff() {
        let mut tx = sender(0);

        tx.push();
        let first = tx.maybe_send().unwrap();
        assert!(first.syn);

        // First timeout: requeue and double the RTO
        tx.tick(RTO);
        let retx = tx.maybe_send().unwrap();
        assert_eq!(retx, first);
        assert_eq!(tx.consecutive_retransmissions(), 1);

        // Doubled RTO: nothing at 1x, fires at 2x
        tx.tick(RTO);
        assert_eq!(tx.maybe_send(), None);
        tx.tick(RTO);
        let retx = tx.maybe_send().unwrap();
        assert_eq!(retx, first);
        assert_eq!(tx.consecutive_retransmissions(), 2);
    }

    #[test]
    fn test_ack_resets_backoff() {
        let mut tx = sender(0);
        tx.receive(&window_only(10));

        tx.writer_mut().push(b"ab");
        tx.push();
        let first = tx.maybe_send().unwrap();
        assert_eq!(first.sequence_length(), 3);

        tx.tick(RTO);
        tx.maybe_send();
        assert_eq!(tx.consecutive_retransmissions(), 1);

        tx.receive(&ack(3, 10));
        assert_eq!(tx.consecutive_retransmissions(), 0);
        assert_eq!(tx.sequence_numbers_in_flight(), 0);
        assert!(!tx.timer_armed());
    }

    #[test]
    fn test_partial_ack_keeps_timer_running() {
        let mut tx = sender(0);
        tx.receive(&window_only(100));

        tx.writer_mut().push(b"aaaa");
        tx.push();
        let syn_and_data = tx.maybe_send().unwrap();
        assert_eq!(syn_and_data.sequence_length(), 5);

        tx.writer_mut().push(b"bbbb");
        tx.push();
        let data = tx.maybe_send().unwrap();
        assert_eq!(data.sequence_length(), 4);

        // Acks the first segment only
        tx.receive(&ack(5, 100));
        assert_eq!(tx.sequence_numbers_in_flight(), 4);
        assert!(tx.timer_armed());

        // Timer restarted from zero: fires one full RTO later
        tx.tick(RTO - 1);
        assert_eq!(tx.maybe_send(), None);
        tx.tick(1);
        let retx = tx.maybe_send().unwrap();
        assert_eq!(retx, data);
    }

    #[test]
    fn test_ack_inside_segment_acks_nothing() {
        let mut tx = sender(0);
        tx.receive(&window_only(100));

        tx.writer_mut().push(b"abcd");
        tx.push();
        tx.maybe_send().unwrap();
        assert_eq!(tx.sequence_numbers_in_flight(), 5);

        // Covers only part of the segment
        tx.receive(&ack(3, 100));
        assert_eq!(tx.sequence_numbers_in_flight(), 5);
        assert!(tx.timer_armed());
    }

    #[test]
    fn test_invalid_ack_ignored() {
        let mut tx = sender(0);

        tx.push();
        tx.maybe_send().unwrap();
        assert_eq!(tx.sequence_numbers_in_flight(), 1);

        // Beyond anything sent
        tx.receive(&ack(5, 10));
        assert_eq!(tx.sequence_numbers_in_flight(), 1);

        // Valid ack still lands afterwards
        tx.receive(&ack(1, 10));
        assert_eq!(tx.sequence_numbers_in_flight(), 0);
    }

    #[test]
    fn test_zero_window_probe_no_backoff() {
        let mut tx = sender(0);

        tx.push();
        tx.maybe_send().unwrap();
        tx.receive(&ack(1, 0)); // window slams shut

        tx.writer_mut().push(b"x");
        tx.push();
        let probe = tx.maybe_send().unwrap();
        assert_eq!(probe.payload, b"x");

        // Probe retransmits at a flat interval, no backoff counting
        tx.tick(RTO);
        let retx = tx.maybe_send().unwrap();
        assert_eq!(retx, probe);
        assert_eq!(tx.consecutive_retransmissions(), 0);

        tx.tick(RTO);
        assert!(tx.maybe_send().is_some());
        assert_eq!(tx.consecutive_retransmissions(), 0);
    }

    #[test]
    fn test_fin_waits_for_window_room() {
        let mut tx = sender(0);
        tx.receive(&window_only(3));

        tx.writer_mut().push(b"abc");
        tx.writer_mut().close();
        tx.push();

        // SYN + "ab" fills the window; no room for the last byte or FIN
        let msg = tx.maybe_send().unwrap();
        assert!(msg.syn);
        assert_eq!(msg.payload, b"ab");
        assert!(!msg.fin);

        tx.receive(&ack(3, 2));
        tx.push();
        let msg = tx.maybe_send().unwrap();
        assert_eq!(msg.payload, b"c");
        assert!(msg.fin);
        assert_eq!(tx.maybe_send(), None);
    }

    #[test]
    fn test_bare_fin_after_stream_closes() {
        let mut tx = sender(0);
        tx.receive(&window_only(10));

        tx.writer_mut().push(b"hi");
        tx.push();
        let msg = tx.maybe_send().unwrap();
        assert!(!msg.fin);

        tx.writer_mut().close();
        tx.push();
        let fin = tx.maybe_send().unwrap();
        assert!(fin.fin);
        assert!(fin.payload.is_empty());
        assert_eq!(fin.seqno, Wrap32::new(3));
    }

    #[test]
    fn test_send_empty_message_uses_wrapped_next_seqno() {
        let mut tx = sender(u32::MAX);

        let msg = tx.send_empty_message();
        assert_eq!(msg.seqno, Wrap32::new(u32::MAX));
        assert_eq!(msg.sequence_length(), 0);

        // SYN consumes a slot and the seqno wraps around
        tx.push();
        tx.maybe_send();
        assert_eq!(tx.send_empty_message().seqno, Wrap32::new(0));
    }

    #[test]
    fn test_retransmission_preserves_lowest_seqno_first() {
        let mut tx = sender(0);
        tx.receive(&window_only(100));

        tx.writer_mut().push(b"aaaa");
        tx.push();
        let first = tx.maybe_send().unwrap();
        tx.writer_mut().push(b"bbbb");
        tx.push();
        tx.maybe_send().unwrap();

        // Timeout requeues the oldest segment ahead of anything else
        tx.tick(RTO);
        let retx = tx.maybe_send().unwrap();
        assert_eq!(retx, first);
        assert_eq!(tx.sequence_numbers_in_flight(), 9);
    }
}
