//! Bus line GPIO for RP2040
//!
//! Inputs are pulled up (the bus idles high). A port snapshot places each
//! line at its own GPIO number, so a snapshot word reads like the SIO input
//! register restricted to the two bus pins.

use embassy_rp::gpio::{AnyPin, Input, Level, Output, Pull};
use embassy_rp::Peri;
use tracewire_hal::{InputPin, LineDriver, OutputPin, PortSampler};

/// The two monitored bus inputs
pub struct BusInputs {
    data: Input<'static>,
    clock: Input<'static>,
    data_bit: u8,
    clock_bit: u8,
}

impl BusInputs {
    pub fn new(
        data: Peri<'static, AnyPin>,
        clock: Peri<'static, AnyPin>,
        data_bit: u8,
        clock_bit: u8,
    ) -> Self {
        Self {
            data: Input::new(data, Pull::Up),
            clock: Input::new(clock, Pull::Up),
            data_bit,
            clock_bit,
        }
    }

    /// The clock line alone, for the glitch detectors
    ///
    /// Reads are plain SIO loads, so both cores may hold one at once.
    pub fn clock_line(&self) -> BusLine<'_> {
        BusLine(&self.clock)
    }
}

impl BusInputs {
    fn snapshot(&self) -> u32 {
        let data = self.data.is_high() as u32;
        let clock = self.clock.is_high() as u32;
        (data << self.data_bit) | (clock << self.clock_bit)
    }
}

impl PortSampler for BusInputs {
    fn read_all(&mut self) -> u32 {
        self.snapshot()
    }
}

/// Shared view, for a worker core sampling while core0 watches the clock
impl PortSampler for &BusInputs {
    fn read_all(&mut self) -> u32 {
        self.snapshot()
    }
}

/// One bus input viewed as a single line
pub struct BusLine<'a>(&'a Input<'static>);

impl InputPin for BusLine<'_> {
    fn is_high(&mut self) -> bool {
        self.0.is_high()
    }
}

/// Push-pull output used for replay
pub struct ReplayPin(Output<'static>);

impl ReplayPin {
    /// Configure `pin` as an output, idling high like the bus
    pub fn new(pin: Peri<'static, AnyPin>) -> Self {
        Self(Output::new(pin, Level::High))
    }
}

impl OutputPin for ReplayPin {
    fn set_high(&mut self) {
        self.0.set_high();
    }

    fn set_low(&mut self) {
        self.0.set_low();
    }
}

/// Data/clock replay outputs
pub type ReplayOutputs = (ReplayPin, ReplayPin);

/// Build the replay output pair
pub fn replay_outputs(data: Peri<'static, AnyPin>, clock: Peri<'static, AnyPin>) -> ReplayOutputs {
    (ReplayPin::new(data), ReplayPin::new(clock))
}

/// Drive both outputs back to the idle-high level
pub fn release_bus<L: LineDriver>(lines: &mut L) {
    lines.drive(true, true);
}
