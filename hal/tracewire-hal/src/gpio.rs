//! GPIO line abstractions
//!
//! Bus lines are read either one at a time ([`InputPin`]) or as a whole
//! port snapshot ([`PortSampler`]), where each bit of the word is the level
//! of the GPIO with that number.

/// Digital input line
pub trait InputPin {
    /// Check if the line reads high (logic 1)
    fn is_high(&mut self) -> bool;

    /// Check if the line reads low (logic 0)
    fn is_low(&mut self) -> bool {
        !self.is_high()
    }
}

/// Digital output line
pub trait OutputPin {
    /// Set the line high (logic 1)
    fn set_high(&mut self);

    /// Set the line low (logic 0)
    fn set_low(&mut self);

    /// Set the line to a specific state
    fn set_state(&mut self, high: bool) {
        if high {
            self.set_high();
        } else {
            self.set_low();
        }
    }
}

/// Snapshot of every monitored input at one instant
pub trait PortSampler {
    /// Read all GPIO input levels as one word (bit `n` = GPIO `n`)
    fn read_all(&mut self) -> u32;

    /// Read a single bit of the port
    fn bit(&mut self, bit: u8) -> bool {
        (self.read_all() >> bit) & 1 != 0
    }
}

impl<T: PortSampler + ?Sized> PortSampler for &mut T {
    fn read_all(&mut self) -> u32 {
        (**self).read_all()
    }
}

/// Output pair used to reproduce a recorded two-wire timeline
pub trait LineDriver {
    /// Drive the data and clock outputs to the given levels together
    fn drive(&mut self, data: bool, clock: bool);
}

/// Two independent output pins form a [`LineDriver`]
impl<D: OutputPin, C: OutputPin> LineDriver for (D, C) {
    fn drive(&mut self, data: bool, clock: bool) {
        self.0.set_state(data);
        self.1.set_state(clock);
    }
}

impl<T: LineDriver + ?Sized> LineDriver for &mut T {
    fn drive(&mut self, data: bool, clock: bool) {
        (**self).drive(data, clock)
    }
}
