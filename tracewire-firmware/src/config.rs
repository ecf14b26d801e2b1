//! Board configuration
//!
//! Wiring for a Raspberry Pi Pico on the bench harness. The monitored bus is
//! tapped through level shifters on GPIO 20/21; the replay outputs drive a
//! second harness on GPIO 0/1.

use tracewire_core::config::{BusLayout, CAPTURE_WINDOW_WORDS};
use tracewire_core::{CaptureBuffer, FlashCaptureStore};
use tracewire_hal_rp2040::CaptureRegion;

/// Monitored data line
pub const DATA_PIN: u8 = 20;
/// Monitored clock line
pub const CLOCK_PIN: u8 = 21;
/// Replayed data line
pub const REPLAY_DATA_PIN: u8 = 0;
/// Replayed clock line
pub const REPLAY_CLOCK_PIN: u8 = 1;

/// Snapshot layout matching the pins above
pub const BUS_LAYOUT: BusLayout = BusLayout::new(DATA_PIN, CLOCK_PIN);

/// Console baud rate (UART0 on GPIO 16/17)
pub const CONSOLE_BAUD: u32 = 115_200;
pub const CONSOLE_TX_BUF: usize = 1024;
/// Sized for import text arriving while core0 is busy programming flash
pub const CONSOLE_RX_BUF: usize = 4096;

/// Watchdog scratch register holding the performance mode
pub const PERFORMANCE_SCRATCH: usize = 2;

/// core1 -> core0 report queue (one slot is kept free)
pub const EVENT_QUEUE_LEN: usize = 32;
/// core0 -> core1 import character queue
pub const CHAR_QUEUE_LEN: usize = 512;

/// Digits accepted when typing a slot index
pub const INDEX_DIGITS: usize = 4;

/// Core0 glitch detector line samples between keyboard checks
pub const GLITCH_KEY_POLL_EVERY: u32 = 1024;

/// Import progress dot every this many characters
pub const IMPORT_PROGRESS_EVERY: u32 = 100_000;

pub type Buffer = CaptureBuffer<CAPTURE_WINDOW_WORDS>;
pub type Store = FlashCaptureStore<CaptureRegion, CAPTURE_WINDOW_WORDS>;
