//! Microsecond clock from the embassy time driver
//!
//! The RP2040 timer ticks at 1 MHz and reading it takes no lock, so the
//! clock is safe to use from either core.

use embassy_time::Instant;
use tracewire_hal::MicrosClock;

/// Free-running microsecond counter, truncated to 32 bits
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbassyClock;

impl MicrosClock for EmbassyClock {
    fn now_us(&self) -> u32 {
        Instant::now().as_micros() as u32
    }
}
