//! Tracewire Hardware Abstraction Layer
//!
//! This crate defines the platform boundary the capture firmware is written
//! against. Chip-specific crates implement these traits; the core logic only
//! ever sees the traits, which keeps it testable on the host.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  tracewire-firmware (menu, core1 entry) │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tracewire-core (store, engine, tasks)  │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  tracewire-hal (this crate - traits)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//!             ┌───────────────┐
//!             │ tracewire-hal-│
//!             │    rp2040     │
//!             └───────────────┘
//! ```
//!
//! # Traits
//!
//! - [`flash::FlashRegion`] - Erase/program/read window of NOR flash
//! - [`gpio::InputPin`], [`gpio::OutputPin`], [`gpio::PortSampler`], [`gpio::LineDriver`] - Bus lines
//! - [`timer::MicrosClock`] - Free-running microsecond counter
//! - [`multicore::WorkerUnit`] - Second execution unit control
//! - [`serial::SerialPort`] - Operator console

#![no_std]
#![deny(unsafe_code)]

pub mod flash;
pub mod gpio;
pub mod multicore;
pub mod serial;
pub mod timer;

// Re-export key traits at crate root for convenience
pub use flash::{FlashError, FlashGeometry, FlashRegion, NorFlashRegion};
pub use gpio::{InputPin, LineDriver, OutputPin, PortSampler};
pub use multicore::{WorkerEntry, WorkerUnit};
pub use serial::SerialPort;
pub use timer::MicrosClock;
