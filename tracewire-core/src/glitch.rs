//! Pulse-width glitch detector
//!
//! Times pulses of one polarity on a single line and reports any shorter
//! than the threshold. Two detectors with opposite polarities, one per
//! unit, cover both edges of the clock.

use tracewire_hal::{InputPin, MicrosClock};

use crate::config::GlitchSettings;
use crate::task::StopToken;

/// Level being timed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// High pulses (rising edge to falling edge)
    High,
    /// Low pulses (falling edge to rising edge)
    Low,
}

impl Polarity {
    fn is_active(self, high: bool) -> bool {
        match self {
            Polarity::High => high,
            Polarity::Low => !high,
        }
    }
}

/// A pulse shorter than the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlitchEvent {
    pub polarity: Polarity,
    pub duration_us: u32,
}

/// Single-line, single-polarity pulse timer
pub struct GlitchDetector<L, C> {
    line: L,
    clock: C,
    polarity: Polarity,
    threshold_us: u32,
}

impl<L: InputPin, C: MicrosClock> GlitchDetector<L, C> {
    pub fn new(line: L, clock: C, polarity: Polarity, settings: GlitchSettings) -> Self {
        Self {
            line,
            clock,
            polarity,
            threshold_us: settings.threshold_us,
        }
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Time pulses until `stop` fires, calling `report` for each glitch
    ///
    /// A pulse already in progress when the detector starts is skipped.
    pub fn run<S, R>(&mut self, stop: &mut S, mut report: R)
    where
        S: StopToken,
        R: FnMut(GlitchEvent),
    {
        if !self.wait_while(true, stop) {
            return;
        }
        loop {
            if !self.wait_while(false, stop) {
                return;
            }
            let start = self.clock.now_us();
            if !self.wait_while(true, stop) {
                return;
            }
            let width = self.clock.elapsed_since(start);
            if width < self.threshold_us {
                report(GlitchEvent {
                    polarity: self.polarity,
                    duration_us: width,
                });
            }
        }
    }

    /// Spin while the line's activity equals `active`; false if stopped
    fn wait_while<S: StopToken>(&mut self, active: bool, stop: &mut S) -> bool {
        loop {
            if stop.should_stop() {
                return false;
            }
            if self.polarity.is_active(self.line.is_high()) != active {
                return true;
            }
        }
    }
}
