//! Timekeeping abstractions
//!
//! Busy-wait sleeping uses `embedded_hal::delay::DelayNs`; this module only
//! covers reading the current time.

/// Free-running microsecond counter
///
/// The value wraps at `u32::MAX`, so intervals must be computed with
/// [`MicrosClock::elapsed_since`] rather than plain subtraction.
pub trait MicrosClock {
    /// Current time in microseconds
    fn now_us(&self) -> u32;

    /// Microseconds since `start`, tolerant of one wrap
    fn elapsed_since(&self, start: u32) -> u32 {
        self.now_us().wrapping_sub(start)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(u32);

    impl MicrosClock for Fixed {
        fn now_us(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn test_elapsed_across_wrap() {
        let clock = Fixed(5);
        assert_eq!(clock.elapsed_since(u32::MAX - 4), 10);
    }
}
