//! Capture/replay engine
//!
//! ```text
//!  Idle ──▶ PreTrigger ──(clock at trigger level)──▶ PostTrigger ──▶ Idle
//!  Idle ──▶ Replaying ──▶ Idle
//! ```
//!
//! PreTrigger writes positions `0..pre` in a fixed forward pass and repeats
//! the pass until the clock satisfies the trigger, so the retained samples
//! are the last full pass rather than a sliding window. PostTrigger fills
//! `pre..W` unconditionally. Every sample is followed by one sample period
//! of busy-wait, and every iteration polls the stop token.

use embedded_hal::delay::DelayNs;
use tracewire_hal::{FlashRegion, LineDriver, PortSampler};

use crate::buffer::CaptureBuffer;
use crate::config::CaptureSettings;
use crate::store::{CaptureSink, FlashCaptureStore, StoreError};
use crate::task::StopToken;

/// Why an engine run ended early
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineError {
    /// Stop token observed
    Stopped,
    /// Store read failed while loading a capture
    Store(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Cancelled => EngineError::Stopped,
            other => EngineError::Store(other),
        }
    }
}

/// One finished capture/replay cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CycleReport {
    /// Zero-based cycle number
    pub cycle: u32,
    /// Append result, `None` when persistence is disabled
    pub persisted: Option<Result<u32, StoreError>>,
}

/// Fixed-rate sampler and replayer for the two bus lines
pub struct CaptureEngine<P, L, D> {
    port: P,
    lines: L,
    delay: D,
    settings: CaptureSettings,
}

impl<P, L, D> CaptureEngine<P, L, D>
where
    P: PortSampler,
    L: LineDriver,
    D: DelayNs,
{
    pub fn new(port: P, lines: L, delay: D, settings: CaptureSettings) -> Self {
        Self {
            port,
            lines,
            delay,
            settings,
        }
    }

    pub fn settings(&self) -> &CaptureSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: CaptureSettings) {
        self.settings = settings;
    }

    /// Release the hardware
    pub fn into_parts(self) -> (P, L, D) {
        (self.port, self.lines, self.delay)
    }

    /// Capture one window into `buffer`
    pub fn capture<S, const W: usize>(
        &mut self,
        buffer: &mut CaptureBuffer<W>,
        stop: &mut S,
    ) -> Result<(), EngineError>
    where
        S: StopToken,
    {
        let pre = self.settings.pre_trigger.min(W);
        let period = self.settings.sample_period_us;
        let clock_bit = self.settings.layout.clock_bit;
        let trigger = self.settings.trigger;
        let words = buffer.words_mut();

        loop {
            for word in words[..pre].iter_mut() {
                if stop.should_stop() {
                    return Err(EngineError::Stopped);
                }
                *word = self.port.read_all();
                self.delay.delay_us(period);
            }
            if stop.should_stop() {
                return Err(EngineError::Stopped);
            }
            if trigger.is_met(self.port.bit(clock_bit)) {
                break;
            }
        }

        for word in words[pre..].iter_mut() {
            if stop.should_stop() {
                return Err(EngineError::Stopped);
            }
            *word = self.port.read_all();
            self.delay.delay_us(period);
        }
        Ok(())
    }

    /// Drive the two output lines from `buffer`, one sample per period
    pub fn replay<S, const W: usize>(
        &mut self,
        buffer: &CaptureBuffer<W>,
        stop: &mut S,
    ) -> Result<(), EngineError>
    where
        S: StopToken,
    {
        let period = self.settings.sample_period_us;
        let layout = self.settings.layout;
        for &word in buffer.words() {
            if stop.should_stop() {
                return Err(EngineError::Stopped);
            }
            self.lines.drive(layout.data(word), layout.clock(word));
            self.delay.delay_us(period);
        }
        Ok(())
    }

    /// Capture, optionally persist, then replay, for the configured number
    /// of iterations (0 runs until stopped)
    ///
    /// A failed append is reported in the cycle's [`CycleReport`] and the
    /// loop carries on.
    pub fn run<S, K, R, const W: usize>(
        &mut self,
        buffer: &mut CaptureBuffer<W>,
        sink: &mut K,
        stop: &mut S,
        mut report: R,
    ) -> Result<u32, EngineError>
    where
        S: StopToken,
        K: CaptureSink<W>,
        R: FnMut(CycleReport),
    {
        let iterations = self.settings.iterations;
        let mut cycle = 0u32;

        loop {
            self.capture(buffer, stop)?;

            let persisted = if self.settings.persist {
                match sink.persist(buffer) {
                    Err(StoreError::Cancelled) => return Err(EngineError::Stopped),
                    result => Some(result),
                }
            } else {
                None
            };

            self.replay(buffer, stop)?;
            report(CycleReport { cycle, persisted });

            cycle = cycle.wrapping_add(1);
            if iterations != 0 && cycle >= iterations {
                return Ok(cycle);
            }
        }
    }

    /// Load every stored capture in slot order and replay it
    ///
    /// Returns the number of captures replayed. `on_slot` is called before
    /// each replay.
    pub fn replay_stored<F, S, R, const W: usize>(
        &mut self,
        store: &mut FlashCaptureStore<F, W>,
        buffer: &mut CaptureBuffer<W>,
        stop: &mut S,
        mut on_slot: R,
    ) -> Result<u32, EngineError>
    where
        F: FlashRegion,
        S: StopToken,
        R: FnMut(u32),
    {
        let count = store.count();
        for slot in 0..count {
            if stop.should_stop() {
                return Err(EngineError::Stopped);
            }
            store.read_slot(slot, buffer)?;
            on_slot(slot);
            self.replay(buffer, stop)?;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriggerLevel;
    use crate::mock::{CountingPort, NoDelay, RamFlash, RecordingLines};
    use crate::task::{StopWhen, TaskHandle};

    const CLK: u32 = 1 << 21;

    fn engine(
        clock_high_from: u32,
        settings: CaptureSettings,
    ) -> CaptureEngine<CountingPort, RecordingLines, NoDelay> {
        CaptureEngine::new(
            CountingPort {
                reads: 0,
                clock_bit: 21,
                clock_high_from,
            },
            RecordingLines::default(),
            NoDelay,
            settings,
        )
    }

    fn settings(pre_trigger: usize) -> CaptureSettings {
        CaptureSettings {
            pre_trigger,
            ..CaptureSettings::default()
        }
    }

    #[test]
    fn test_pre_trigger_repeats_until_clock_high() {
        let mut engine = engine(12, settings(4));
        let mut buf: CaptureBuffer<16> = CaptureBuffer::new();
        let handle = TaskHandle::new();

        engine.capture(&mut buf, &mut &handle).unwrap();

        // Passes read 0..=3 (check 4), 5..=8 (check 9), 10..=13 (check 14: high)
        assert_eq!(&buf.words()[..4], &[10, 11, 12 | CLK, 13 | CLK]);
        // Post-trigger continues from the next read
        assert_eq!(buf.words()[4], 15 | CLK);
        assert_eq!(buf.words()[15], 26 | CLK);
    }

    #[test]
    fn test_low_trigger() {
        let mut s = settings(2);
        s.trigger = TriggerLevel::Low;
        let mut engine = engine(0, s);
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        // Clock never goes low: must spin until stopped
        let mut polls = 0;
        let result = engine.capture(
            &mut buf,
            &mut StopWhen(|| {
                polls += 1;
                polls > 50
            }),
        );
        assert_eq!(result, Err(EngineError::Stopped));
    }

    #[test]
    fn test_pre_trigger_clamped_to_window() {
        let mut engine = engine(0, settings(200));
        let mut buf: CaptureBuffer<8> = CaptureBuffer::new();
        let handle = TaskHandle::new();

        engine.capture(&mut buf, &mut &handle).unwrap();
        assert_eq!(buf.words()[7], 7 | CLK);
    }

    #[test]
    fn test_stop_during_capture() {
        let mut engine = engine(u32::MAX, settings(4));
        let mut buf: CaptureBuffer<16> = CaptureBuffer::new();
        let handle = TaskHandle::new();
        handle.request_stop();

        assert_eq!(
            engine.capture(&mut buf, &mut &handle),
            Err(EngineError::Stopped)
        );
    }

    #[test]
    fn test_replay_drives_bus_bits() {
        let mut engine = engine(0, settings(0));
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        buf.words_mut()
            .copy_from_slice(&[0, 1 << 20, 1 << 21, (3 << 20) | 0xFFFF]);
        let handle = TaskHandle::new();

        engine.replay(&buf, &mut &handle).unwrap();

        let (_, lines, _) = engine.into_parts();
        assert_eq!(
            lines.driven,
            [(false, false), (true, false), (false, true), (true, true)]
        );
    }

    struct CountingSink {
        calls: u32,
        fail: bool,
    }

    impl<const W: usize> CaptureSink<W> for CountingSink {
        fn persist(&mut self, _buffer: &CaptureBuffer<W>) -> Result<u32, StoreError> {
            self.calls += 1;
            if self.fail {
                Err(StoreError::StoreFull)
            } else {
                Ok(self.calls - 1)
            }
        }
    }

    #[test]
    fn test_run_exact_iterations() {
        let mut s = settings(2);
        s.iterations = 3;
        let mut engine = engine(0, s);
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        let mut sink = CountingSink {
            calls: 0,
            fail: false,
        };
        let handle = TaskHandle::new();
        let mut cycles = std::vec::Vec::new();

        let ran = engine
            .run(&mut buf, &mut sink, &mut &handle, |r| cycles.push(r))
            .unwrap();

        assert_eq!(ran, 3);
        assert_eq!(sink.calls, 3);
        assert_eq!(cycles.len(), 3);
        assert_eq!(cycles[2].persisted, Some(Ok(2)));
    }

    #[test]
    fn test_run_continues_after_append_failure() {
        let mut s = settings(2);
        s.iterations = 2;
        let mut engine = engine(0, s);
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        let mut sink = CountingSink {
            calls: 0,
            fail: true,
        };
        let handle = TaskHandle::new();
        let mut failures = 0;

        let ran = engine
            .run(&mut buf, &mut sink, &mut &handle, |r| {
                if r.persisted == Some(Err(StoreError::StoreFull)) {
                    failures += 1;
                }
            })
            .unwrap();

        assert_eq!(ran, 2);
        assert_eq!(failures, 2);
        // Replay still happened each cycle
        let (_, lines, _) = engine.into_parts();
        assert_eq!(lines.driven.len(), 8);
    }

    #[test]
    fn test_run_without_persist() {
        let mut s = settings(2);
        s.iterations = 1;
        s.persist = false;
        let mut engine = engine(0, s);
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        let mut sink = CountingSink {
            calls: 0,
            fail: false,
        };
        let handle = TaskHandle::new();

        engine
            .run(&mut buf, &mut sink, &mut &handle, |r| assert!(r.persisted.is_none()))
            .unwrap();
        assert_eq!(sink.calls, 0);
    }

    #[test]
    fn test_unbounded_run_stops_on_token() {
        let mut engine = engine(0, settings(2));
        let mut buf: CaptureBuffer<4> = CaptureBuffer::new();
        let mut sink = CountingSink {
            calls: 0,
            fail: false,
        };
        let mut cycles = 0u32;
        let mut polls = 0u32;

        let result = engine.run(
            &mut buf,
            &mut sink,
            &mut StopWhen(|| {
                polls += 1;
                polls > 200
            }),
            |_| cycles += 1,
        );

        assert_eq!(result, Err(EngineError::Stopped));
        assert!(cycles > 1);
    }

    #[test]
    fn test_replay_stored_in_slot_order() {
        const W: usize = 8;
        let mut store: FlashCaptureStore<RamFlash, W> =
            FlashCaptureStore::new(RamFlash::new(64 + 3 * 32, 64, 32)).unwrap();
        let mut buf: CaptureBuffer<W> = CaptureBuffer::new();
        for slot in 0..2u32 {
            buf.words_mut().fill(if slot == 0 { 0 } else { 3 << 20 });
            store.append(&buf).unwrap();
        }

        let mut engine = engine(0, settings(0));
        let handle = TaskHandle::new();
        let mut seen = std::vec::Vec::new();

        let replayed = engine
            .replay_stored(&mut store, &mut buf, &mut &handle, |s| seen.push(s))
            .unwrap();

        assert_eq!(replayed, 2);
        assert_eq!(seen, [0, 1]);
        let (_, lines, _) = engine.into_parts();
        assert_eq!(lines.driven[0], (false, false));
        assert_eq!(lines.driven[W], (true, true));
    }
}
