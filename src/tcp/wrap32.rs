use std::ops::Add;

/// A 32-bit sequence number, relative to an arbitrary zero point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wrap32 {
    value: u32,
}

impl Wrap32 {
    const WRAP_SIZE: u64 = 1 << 32;
    const HALF_WRAP: u64 = 1 << 31;

    pub fn new(value: u32) -> Self {
        Wrap32 { value }
    }

    /// The raw 32-bit value
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Wrap an absolute sequence number given the stream's `zero_point`
    pub fn wrap(n: u64, zero_point: Wrap32) -> Self {
        Wrap32::new((n + zero_point.value as u64) as u32)
    }

    /// Unwrap to the absolute sequence number closest to `checkpoint`.
    ///
    /// Ties break toward the larger candidate, and the result is never
    /// negative: near checkpoint zero the nearest non-negative
    /// representative wins.
    pub fn unwrap(&self, zero_point: Wrap32, checkpoint: u64) -> u64 {
        let relative = self.value.wrapping_sub(zero_point.value) as u64;

        // Number of whole wraps that lands `relative` closest to the
        // checkpoint; saturation keeps the result non-negative
        let k = (checkpoint + Self::HALF_WRAP).saturating_sub(relative) >> 32;

        relative + k * Self::WRAP_SIZE
    }
}

impl Add for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: Wrap32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other.value))
    }
}

impl Add<u32> for Wrap32 {
    type Output = Wrap32;

    fn add(self, other: u32) -> Wrap32 {
        Wrap32::new(self.value.wrapping_add(other))
    }
}

// -- Unit tests --

#[cfg(test)]
mod tests {
    use super::*;
    use rand::distributions::Distribution;
    use rand::distributions::Uniform;
    use rand::Rng;
    use rayon::prelude::*;

    // -- Test wrapping --

    #[test]
    fn test_wrap_zero_offset() {
        let seq_no = 3 * (1u64 << 32);
        let zero = Wrap32::new(0);

        assert_eq!(Wrap32::wrap(seq_no, zero), Wrap32::new(0));
    }

    #[test]
    fn test_wrap_positive_offset() {
        let seq_no = 3 * (1u64 << 32) + 17;
        let zero = Wrap32::new(15);

        assert_eq!(Wrap32::wrap(seq_no, zero), Wrap32::new(32));
    }

    #[test]
    fn test_wrap_negative_offset() {
        let seq_no = 7 * (1u64 << 32) - 2;
        let zero = Wrap32::new(15);

        assert_eq!(Wrap32::wrap(seq_no, zero), Wrap32::new(13));
    }

    #[test]
    fn test_wrap_near_zero_point_rollover() {
        let zero = Wrap32::new(0xFFFF_FFF0);

        assert_eq!(Wrap32::wrap((1u64 << 32) + 23, zero), Wrap32::new(7));
    }

    // -- Test unwrapping --

    #[test]
    fn test_unwrap_first_sequence_after_zero() {
        let unwrapped = Wrap32::new(1).unwrap(Wrap32::new(0), 0);
        assert_eq!(unwrapped, 1u64)
    }

    #[test]
    fn test_unwrap_first_sequence_after_first_wraparound() {
        let unwrapped = Wrap32::new(1).unwrap(Wrap32::new(0), u32::MAX as u64);
        assert_eq!(unwrapped, (1u64 << 32) + 1)
    }

    #[test]
    fn test_unwrap_last_sequence_before_third_wraparound() {
        let unwrapped = Wrap32::new(u32::MAX - 1).unwrap(Wrap32::new(0), 3 * (1u64 << 32));
        assert_eq!(unwrapped, 3 * (1u64 << 32) - 2);
    }

    #[test]
    fn test_unwrap_tenth_before_third_wraparound() {
        let unwrapped = Wrap32::new(u32::MAX - 10).unwrap(Wrap32::new(0), 3 * (1u64 << 32));
        assert_eq!(unwrapped, 3 * (1u64 << 32) - 11);
    }

    #[test]
    fn test_unwrap_with_nonzero_zero_point() {
        let unwrapped = Wrap32::new(u32::MAX).unwrap(Wrap32::new(10), 3 * (1u64 << 32));
        assert_eq!(unwrapped, 3 * (1u64 << 32) - 11);
    }

    #[test]
    fn test_unwrap_max_wrapped_value_with_zero_point_zero() {
        let unwrapped = Wrap32::new(u32::MAX).unwrap(Wrap32::new(0), 0);
        assert_eq!(unwrapped, u32::MAX as u64);
    }

    #[test]
    fn test_unwrap_value_equals_zero_point_returns_zero() {
        let unwrapped = Wrap32::new(16).unwrap(Wrap32::new(16), 0);
        assert_eq!(unwrapped, 0u64);
    }

    #[test]
    fn test_unwrap_max_value_with_nonzero_zero_point() {
        let unwrapped = Wrap32::new(15).unwrap(Wrap32::new(16), 0);
        assert_eq!(unwrapped, u32::MAX as u64);
    }

    #[test]
    fn test_unwrap_zero_value_with_large_zero_point() {
        let unwrapped = Wrap32::new(0).unwrap(Wrap32::new(i32::MAX as u32), 0);
        assert_eq!(unwrapped, (i32::MAX as u64) + 2);
    }

    #[test]
    fn test_unwrap_max_value_with_max_zero_point_returns_half_wrap() {
        let unwrapped = Wrap32::new(u32::MAX).unwrap(Wrap32::new(i32::MAX as u32), 0);
        assert_eq!(unwrapped, 1u64 << 31);
    }

    #[test]
    fn test_unwrap_max_value_with_half_wrap_zero_point() {
        let unwrapped = Wrap32::new(u32::MAX).unwrap(Wrap32::new(1 << 31), 0);
        assert_eq!(unwrapped, (u32::MAX as u64) >> 1);
    }

    #[test]
    fn test_unwrap_checkpoint_near_zero_upper_half_offset() {
        // The negative representative would be nearer; the non-negative
        // one must win
        let unwrapped = Wrap32::new(0xFFFF_0000).unwrap(Wrap32::new(0), 1u64 << 31);
        assert_eq!(unwrapped, 0xFFFF_0000u64);

        let unwrapped = Wrap32::new(7).unwrap(Wrap32::new(0xFFFF_FFF0), (1u64 << 32) + 10);
        assert_eq!(unwrapped, (1u64 << 32) + 23);
    }

    // -- Test `+` operator overloads --

    #[test]
    fn test_add() {
        let x = Wrap32::new(1);
        let y = Wrap32::new(2);
        assert_eq!(x + y, Wrap32::new(3));
        assert_eq!(x + 2u32, Wrap32::new(3));
    }

    #[test]
    fn test_add_overflow() {
        let x = Wrap32::new(u32::MAX);
        assert_eq!(x + Wrap32::new(1), Wrap32::new(0));
        assert_eq!(x + 1u32, Wrap32::new(0));
    }

    // -- Test roundtrip --

    #[test]
    fn test_roundtrip() {
        fn check_roundtrip(zero: Wrap32, value: u64, checkpoint: u64) {
            assert_eq!(Wrap32::wrap(value, zero).unwrap(zero, checkpoint), value)
        }

        let n_reps = 1_000_000;
        let dist31minus1 = Uniform::from(0u32..=(1u32 << 31) - 1);
        let dist32 = Uniform::from(0u32..=u32::MAX);
        let big_offset: u64 = (1u64 << 31) - 1;
        let dist63 = Uniform::from(big_offset..=(1u64 << 63));

        // Run parallel tests because we don't have all the time in the world
        (0..n_reps).into_par_iter().for_each(|_| {
            let mut rng = rand::thread_rng();
            let zero = Wrap32::new(dist32.sample(&mut rng));
            let val = dist63.sample(&mut rng);
            let offset = dist31minus1.sample(&mut rng) as u64;

            check_roundtrip(zero, val, val);
            check_roundtrip(zero, val + 1, val);
            check_roundtrip(zero, val - 1, val);
            check_roundtrip(zero, val + offset, val);
            check_roundtrip(zero, val - offset, val);
            check_roundtrip(zero, val + big_offset, val);
            check_roundtrip(zero, val - big_offset, val);
        });
    }

    #[test]
    fn test_equality_random() {
        let n_reps = 32768;
        let mut rng = rand::thread_rng();
        for _ in 0..n_reps {
            let n: u32 = rng.gen();
            let diff: u8 = rng.gen();
            let m: u32 = n.wrapping_add(diff as u32);

            assert_eq!(Wrap32::new(n) == Wrap32::new(m), n == m);
            assert_eq!(Wrap32::new(n) != Wrap32::new(m), n != m);
        }
    }
}
