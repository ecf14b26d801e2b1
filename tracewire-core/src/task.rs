//! Cross-unit task handle
//!
//! The only state the supervisor and the worker touch while a task runs.
//! Every field is a single naturally aligned atomic word; the persist
//! request word is the Release/Acquire barrier that hands the live buffer
//! from worker to supervisor and back.
//!
//! ```text
//!  worker (core1)                       supervisor (core0)
//!  ──────────────                       ──────────────────
//!  fill buffer
//!  request_persist()  ── Release ──▶    persist_pending()   (Acquire)
//!  spin on outcome                      append(buffer)
//!  take_persist_outcome() ◀── Release ─ complete_persist(outcome)
//!  reuse buffer
//! ```

use core::hint::spin_loop;

use portable_atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::buffer::CaptureBuffer;
use crate::store::{CaptureSink, StoreError};

const PERSIST_IDLE: u8 = 0;
const PERSIST_PENDING: u8 = 1;
const PERSIST_DONE: u8 = 2;

const REJECTED_BIT: u32 = 0x8000_0000;

/// Result of a supervisor-side append
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PersistOutcome {
    Stored(u32),
    Rejected(StoreError),
}

impl PersistOutcome {
    pub fn into_result(self) -> Result<u32, StoreError> {
        match self {
            PersistOutcome::Stored(slot) => Ok(slot),
            PersistOutcome::Rejected(e) => Err(e),
        }
    }

    fn encode(self) -> u32 {
        match self {
            PersistOutcome::Stored(slot) => slot & !REJECTED_BIT,
            PersistOutcome::Rejected(e) => REJECTED_BIT | e.code() as u32,
        }
    }

    fn decode(word: u32) -> Self {
        if word & REJECTED_BIT == 0 {
            PersistOutcome::Stored(word)
        } else {
            let e = StoreError::from_code(word as u8).unwrap_or(StoreError::FlashWriteInconsistent);
            PersistOutcome::Rejected(e)
        }
    }
}

impl From<Result<u32, StoreError>> for PersistOutcome {
    fn from(result: Result<u32, StoreError>) -> Self {
        match result {
            Ok(slot) => PersistOutcome::Stored(slot),
            Err(e) => PersistOutcome::Rejected(e),
        }
    }
}

/// Cancellation flag plus persist handshake
#[derive(Debug)]
pub struct TaskHandle {
    stopped: AtomicBool,
    persist: AtomicU8,
    outcome: AtomicU32,
}

impl Default for TaskHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskHandle {
    pub const fn new() -> Self {
        Self {
            stopped: AtomicBool::new(false),
            persist: AtomicU8::new(PERSIST_IDLE),
            outcome: AtomicU32::new(0),
        }
    }

    /// Reset before a launch
    pub fn clear(&self) {
        self.persist.store(PERSIST_IDLE, Ordering::Release);
        self.stopped.store(false, Ordering::Release);
    }

    /// Ask the worker to stop
    pub fn request_stop(&self) {
        self.stopped.store(true, Ordering::Release);
    }

    /// Worker side: the task ran to completion
    pub fn complete(&self) {
        self.request_stop();
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Worker side: publish the live buffer for appending
    pub fn request_persist(&self) {
        self.persist.store(PERSIST_PENDING, Ordering::Release);
    }

    /// Supervisor side: a buffer is waiting to be appended
    pub fn persist_pending(&self) -> bool {
        self.persist.load(Ordering::Acquire) == PERSIST_PENDING
    }

    /// Supervisor side: hand the buffer back with the append result
    pub fn complete_persist(&self, outcome: PersistOutcome) {
        self.outcome.store(outcome.encode(), Ordering::Relaxed);
        self.persist.store(PERSIST_DONE, Ordering::Release);
    }

    /// Worker side: collect the append result, if published
    pub fn take_persist_outcome(&self) -> Option<PersistOutcome> {
        if self.persist.load(Ordering::Acquire) != PERSIST_DONE {
            return None;
        }
        let outcome = PersistOutcome::decode(self.outcome.load(Ordering::Relaxed));
        self.persist.store(PERSIST_IDLE, Ordering::Release);
        Some(outcome)
    }

    /// Supervisor side: if a persist is pending, run it through `sink`
    pub fn service_persist<K, const W: usize>(
        &self,
        sink: &mut K,
        buffer: &CaptureBuffer<W>,
    ) -> Option<PersistOutcome>
    where
        K: CaptureSink<W>,
    {
        if !self.persist_pending() {
            return None;
        }
        let outcome = PersistOutcome::from(sink.persist(buffer));
        self.complete_persist(outcome);
        Some(outcome)
    }
}

/// Cooperative cancellation check polled by every worker loop
pub trait StopToken {
    fn should_stop(&mut self) -> bool;
}

impl StopToken for &TaskHandle {
    fn should_stop(&mut self) -> bool {
        self.is_stopped()
    }
}

/// Adapts any `FnMut() -> bool` into a [`StopToken`]
pub struct StopWhen<F>(pub F);

impl<F: FnMut() -> bool> StopToken for StopWhen<F> {
    fn should_stop(&mut self) -> bool {
        (self.0)()
    }
}

/// Runs an expensive stop check only on every `every`-th poll
///
/// For stop checks that would otherwise add jitter to a timing loop, such
/// as a UART poll between line samples.
pub struct StopEvery<F> {
    every: u32,
    polls: u32,
    check: F,
}

impl<F: FnMut() -> bool> StopEvery<F> {
    /// `every` of zero is treated as one
    pub fn new(every: u32, check: F) -> Self {
        Self {
            every: every.max(1),
            polls: 0,
            check,
        }
    }
}

impl<F: FnMut() -> bool> StopToken for StopEvery<F> {
    fn should_stop(&mut self) -> bool {
        self.polls += 1;
        if self.polls < self.every {
            return false;
        }
        self.polls = 0;
        (self.check)()
    }
}

/// Worker-side sink that asks the supervisor to append the live buffer
///
/// The buffer itself is not passed; the supervisor reads the same live
/// buffer while the worker spins here.
pub struct HandoffSink<'a> {
    handle: &'a TaskHandle,
}

impl<'a> HandoffSink<'a> {
    pub fn new(handle: &'a TaskHandle) -> Self {
        Self { handle }
    }
}

impl<const W: usize> CaptureSink<W> for HandoffSink<'_> {
    fn persist(&mut self, _buffer: &CaptureBuffer<W>) -> Result<u32, StoreError> {
        self.handle.request_persist();
        loop {
            if let Some(outcome) = self.handle.take_persist_outcome() {
                return outcome.into_result();
            }
            if self.handle.is_stopped() {
                return Err(StoreError::Cancelled);
            }
            spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RamFlash;
    use crate::store::FlashCaptureStore;
    use std::thread;

    #[test]
    fn test_stop_flag() {
        let handle = TaskHandle::new();
        assert!(!handle.is_stopped());
        handle.request_stop();
        assert!(handle.is_stopped());
        handle.clear();
        assert!(!handle.is_stopped());
    }

    #[test]
    fn test_outcome_encoding() {
        for outcome in [
            PersistOutcome::Stored(0),
            PersistOutcome::Stored(9),
            PersistOutcome::Rejected(StoreError::StoreFull),
            PersistOutcome::Rejected(StoreError::FlashWriteInconsistent),
        ] {
            assert_eq!(PersistOutcome::decode(outcome.encode()), outcome);
        }
    }

    #[test]
    fn test_handshake_single_threaded() {
        let handle = TaskHandle::new();
        assert!(handle.take_persist_outcome().is_none());

        handle.request_persist();
        assert!(handle.persist_pending());
        assert!(handle.take_persist_outcome().is_none());

        handle.complete_persist(PersistOutcome::Rejected(StoreError::StoreFull));
        assert!(!handle.persist_pending());
        assert_eq!(
            handle.take_persist_outcome(),
            Some(PersistOutcome::Rejected(StoreError::StoreFull))
        );
        assert!(handle.take_persist_outcome().is_none());
    }

    #[test]
    fn test_handoff_sink_across_threads() {
        const W: usize = 8;
        let handle = TaskHandle::new();
        let mut store: FlashCaptureStore<RamFlash, W> =
            FlashCaptureStore::new(RamFlash::new(64 + 2 * 32, 64, 32)).unwrap();
        let mut buffer: CaptureBuffer<W> = CaptureBuffer::new();
        buffer.words_mut()[0] = 0xC0FF_EE00;

        let slot = thread::scope(|s| {
            let worker = s.spawn(|| {
                let mut sink = HandoffSink::new(&handle);
                CaptureSink::<W>::persist(&mut sink, &CaptureBuffer::new())
            });
            while handle.service_persist(&mut store, &buffer).is_none() {
                thread::yield_now();
            }
            worker.join().unwrap()
        });

        assert_eq!(slot, Ok(0));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_handoff_sink_cancelled() {
        let handle = TaskHandle::new();
        handle.request_stop();
        let mut sink = HandoffSink::new(&handle);
        let result = CaptureSink::<4>::persist(&mut sink, &CaptureBuffer::new());
        assert_eq!(result, Err(StoreError::Cancelled));
    }

    #[test]
    fn test_stop_every_checks_sparsely() {
        let mut checks = 0;
        let mut token = StopEvery::new(4, || {
            checks += 1;
            checks == 3
        });

        let polls = (1..=100).find(|_| token.should_stop());
        drop(token);
        assert_eq!(polls, Some(12));
        assert_eq!(checks, 3);
    }

    #[test]
    fn test_stop_every_zero_checks_each_poll() {
        let mut token = StopEvery::new(0, || true);
        assert!(token.should_stop());
    }

    #[test]
    fn test_stop_when_adapter() {
        let mut calls = 0;
        let mut token = StopWhen(|| {
            calls += 1;
            calls > 2
        });
        assert!(!token.should_stop());
        assert!(!token.should_stop());
        assert!(token.should_stop());
    }
}
