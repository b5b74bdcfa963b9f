use crate::stream::byte_stream::ByteStream;
use std::io;
use std::io::Read;

/// Accepts out-of-order substrings of a byte stream and feeds the longest
/// assembled prefix into its output `ByteStream`.
///
/// Storage is a ring sized to the output's capacity plus a parallel
/// occupancy bitmap. A byte at absolute index `p` lives in slot
/// `(base_slot + (p - first_unassembled)) % capacity`; anything outside
/// the window the output can still absorb is dropped and may be offered
/// again later.
#[derive(Debug)]
pub struct Reassembler {
    buffer: Vec<u8>,      // ring storage, one slot per byte of sink capacity
    occupied: Vec<bool>,  // marks slots holding a byte not yet delivered
    base_slot: usize,     // slot of the byte at `first_unassembled`
    first_unassembled: u64,
    end: Option<u64>,     // one past the final byte, once the last substring is seen
    pending: u64,
    output: ByteStream,
}

impl Reassembler {
    /// New `Reassembler` with the provided `ByteStream` as output
    pub fn new(output: ByteStream) -> Self {
        let capacity = output.capacity();
        Reassembler {
            buffer: vec![0; capacity],
            occupied: vec![false; capacity],
            base_slot: 0,
            first_unassembled: 0,
            end: None,
            pending: 0,
            output,
        }
    }

    /// Insert a substring starting at absolute index `first_index`.
    ///
    /// An empty `is_last` substring at or before the assembled prefix
    /// closes the output immediately.
    pub fn insert(&mut self, first_index: u64, data: &[u8], is_last: bool) {
        if is_last {
            self.end = Some(first_index + data.len() as u64);
        }
        if self.end.is_some_and(|end| self.first_unassembled >= end) {
            self.output.close();
        }

        let capacity = self.buffer.len();
        if capacity == 0 {
            return;
        }

        // Clip to [first_unassembled, first_unassembled + unfilled sink capacity)
        let left = first_index.max(self.first_unassembled);
        let right = (first_index + data.len() as u64)
            .min((self.output.bytes_pushed() + self.output.available_capacity()) as u64);
        if left >= right {
            return;
        }

        for pos in left..right {
            let slot = (self.base_slot + (pos - self.first_unassembled) as usize) % capacity;
            self.buffer[slot] = data[(pos - first_index) as usize];
            if !self.occupied[slot] {
                self.occupied[slot] = true;
                self.pending += 1;
            }
        }

        if first_index <= self.first_unassembled {
            self.drain_prefix();
        }
    }

    /// The number of bytes buffered but not yet assembled
    pub fn bytes_pending(&self) -> u64 {
        self.pending
    }

    /// Absolute index of the next byte to deliver
    pub fn first_unassembled(&self) -> u64 {
        self.first_unassembled
    }

    /// The assembled `ByteStream` output
    pub fn output(&self) -> &ByteStream {
        &self.output
    }

    /// Mutable access to the output, for popping assembled bytes
    pub fn output_mut(&mut self) -> &mut ByteStream {
        &mut self.output
    }

    /// Deliver the contiguous occupied run at `base_slot` to the output
    fn drain_prefix(&mut self) {
        let capacity = self.buffer.len();
        if !self.occupied[self.base_slot] {
            return;
        }

        let mut slot = self.base_slot;
        loop {
            if !self.occupied[slot] {
                break;
            }
            self.occupied[slot] = false;
            slot = (slot + 1) % capacity;
            if slot == self.base_slot {
                break; // every slot was occupied
            }
        }

        // One or two contiguous chunks, depending on the ring wrap
        let written = if self.base_slot < slot {
            self.output.push(&self.buffer[self.base_slot..slot]);
            slot - self.base_slot
        } else {
            self.output.push(&self.buffer[self.base_slot..]);
            self.output.push(&self.buffer[..slot]);
            capacity - self.base_slot + slot
        };

        self.first_unassembled += written as u64;
        self.pending -= written as u64;
        self.base_slot = slot;

        if self.end.is_some_and(|end| self.first_unassembled >= end) {
            self.output.close();
        }
    }
}

impl Read for Reassembler {
    /// Read data from the assembled `ByteStream` into the buffer
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.output.read(buf)
    }
}

// -- Unit tests --
