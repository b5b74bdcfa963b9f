//! Tunables shared by the sender and receiver state machines.

/// Largest payload carried by a single segment
pub const MAX_PAYLOAD_SIZE: usize = 1452;

/// Default retransmission timeout in milliseconds
pub const DEFAULT_RT_TIMEOUT_MS: u64 = 1000;

/// Default capacity of the outbound and inbound byte streams
pub const DEFAULT_CAPACITY: usize = 64_000;
