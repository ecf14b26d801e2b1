//! Board-agnostic core logic for the Tracewire bus capture firmware
//!
//! Everything that does not touch a concrete chip lives here:
//!
//! - The live capture buffer and its byte view
//! - Append-only flash capture store
//! - Fixed-rate capture/replay engine with pre-trigger fill
//! - Pulse-width glitch detector
//! - Task handle, persist handshake and the dual-unit orchestrator
//! - Hex import session
//! - Runtime settings
//!
//! Worker code only ever blocks in cooperative busy-waits that poll a
//! [`task::StopToken`], so a supervisor can always stop it by flag or by
//! resetting the unit it runs on.

#![no_std]
#![deny(unsafe_code)]

#[cfg(test)]
extern crate std;

pub mod buffer;
pub mod capture;
pub mod config;
pub mod glitch;
pub mod import;
pub mod orchestrator;
pub mod store;
pub mod task;

#[cfg(test)]
mod mock;

pub use buffer::CaptureBuffer;
pub use capture::{CaptureEngine, CycleReport, EngineError};
pub use config::{CaptureSettings, GlitchSettings, PerformanceMode, TriggerLevel};
pub use glitch::{GlitchDetector, GlitchEvent, Polarity};
pub use import::{CharSource, ImportEnd, ImportReport, ImportSession};
pub use orchestrator::{Completion, Orchestrator};
pub use store::{CaptureSink, FlashCaptureStore, StoreError};
pub use task::{HandoffSink, PersistOutcome, StopEvery, StopToken, TaskHandle};
