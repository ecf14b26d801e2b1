//! Dual-unit task orchestrator
//!
//! Runs one worker task at a time on the second unit. The supervisor owns
//! the [`TaskHandle`] for the lifetime of the program; a worker gets a
//! shared reference to it and must poll [`TaskHandle::is_stopped`] in every
//! loop, including edge waits.
//!
//! # Lifecycle
//!
//! ```text
//!  launch(entry):  request_stop ─▶ settle ─▶ reset ─▶ clear ─▶ start(entry)
//!  wait_for_completion(poll):
//!      spin until is_stopped() or poll() ─▶ request_stop ─▶ settle ─▶ reset ─▶ start(idle)
//! ```
//!
//! The unit is never left in reset: after every task it is restarted into
//! the idle entry so that platform services that expect it to be running
//! (such as flash-write pauses) keep working.

use embedded_hal::delay::DelayNs;
use tracewire_hal::{WorkerEntry, WorkerUnit};

use crate::task::TaskHandle;

/// Settle time between requesting a stop and forcing a reset
pub const STOP_SETTLE_MS: u32 = 1;

/// How a task ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Completion {
    /// The worker set the flag itself
    Finished,
    /// The supervisor's poll asked for cancellation
    Cancelled,
}

/// Supervisor-side controller for the worker unit
pub struct Orchestrator<'a, U, D> {
    unit: U,
    delay: D,
    handle: &'a TaskHandle,
    idle: WorkerEntry,
}

impl<'a, U: WorkerUnit, D: DelayNs> Orchestrator<'a, U, D> {
    /// `idle` is the entry the unit parks in between tasks
    pub fn new(unit: U, delay: D, handle: &'a TaskHandle, idle: WorkerEntry) -> Self {
        Self {
            unit,
            delay,
            handle,
            idle,
        }
    }

    pub fn handle(&self) -> &'a TaskHandle {
        self.handle
    }

    /// Stop whatever is running and start `entry` from a fresh reset
    pub fn launch(&mut self, entry: WorkerEntry) {
        self.handle.request_stop();
        self.delay.delay_ms(STOP_SETTLE_MS);
        self.unit.reset();
        self.handle.clear();
        self.unit.start(entry);
    }

    /// Ask the running task to stop
    pub fn request_stop(&self) {
        self.handle.request_stop();
    }

    /// Block until the task finishes or `poll` returns true, then quiesce
    ///
    /// `poll` is called continuously while the task runs; it is where the
    /// supervisor watches for a keypress and services persist requests.
    pub fn wait_for_completion<P>(&mut self, mut poll: P) -> Completion
    where
        P: FnMut(&TaskHandle) -> bool,
    {
        let completion = loop {
            if self.handle.is_stopped() {
                break Completion::Finished;
            }
            if poll(self.handle) {
                break Completion::Cancelled;
            }
        };
        self.quiesce();
        completion
    }

    /// Stop the unit and park it in the idle entry
    pub fn quiesce(&mut self) {
        self.handle.request_stop();
        self.delay.delay_ms(STOP_SETTLE_MS);
        self.unit.reset();
        self.unit.start(self.idle);
    }
}
