//! RP2040-specific HAL for the Tracewire firmware
//!
//! Implements the `tracewire-hal` traits on top of `embassy-rp`:
//!
//! - Capture flash region in the top of the 2 MB QSPI flash
//! - Bus input sampling and replay outputs
//! - Microsecond clock from the embassy time driver
//! - Core1 reset and launch
//! - Operator console over a buffered UART
//!
//! Everything that core1 may call (sampling, replay, clock, delay) is
//! free of critical sections, so a core1 reset can never leave a lock held.

#![no_std]

pub mod flash;
pub mod gpio;
pub mod multicore;
pub mod serial;
pub mod timer;

pub use flash::CaptureRegion;
pub use gpio::{release_bus, replay_outputs, BusInputs, BusLine, ReplayOutputs, ReplayPin};
pub use multicore::Core1;
pub use serial::{Console, ConsoleError};
pub use timer::EmbassyClock;
