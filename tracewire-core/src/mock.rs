//! Host test doubles shared by the core unit tests

use core::cell::Cell;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;
use tracewire_hal::{
    FlashError, FlashGeometry, FlashRegion, InputPin, LineDriver, MicrosClock, PortSampler,
};

/// RAM-backed NOR flash with erase/program semantics and op counters
pub struct RamFlash {
    pub data: Vec<u8>,
    pub geometry: FlashGeometry,
    pub erases: usize,
    pub programs: usize,
    pub fail_program: bool,
    /// Erasing any sector at or past this offset fails
    pub fail_erase_from: Option<u32>,
}

impl RamFlash {
    pub fn new(len: usize, sector_size: u32, page_size: u32) -> Self {
        Self {
            data: std::vec![0xFF; len],
            geometry: FlashGeometry {
                sector_size,
                page_size,
            },
            erases: 0,
            programs: 0,
            fail_program: false,
            fail_erase_from: None,
        }
    }

    fn check(&self, offset: u32, len: usize) -> Result<usize, FlashError> {
        let start = offset as usize;
        if start + len > self.data.len() {
            return Err(FlashError::OutOfBounds);
        }
        Ok(start)
    }
}

impl FlashRegion for RamFlash {
    fn geometry(&self) -> FlashGeometry {
        self.geometry
    }

    fn len(&self) -> u32 {
        self.data.len() as u32
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let start = self.check(offset, buf.len())?;
        buf.copy_from_slice(&self.data[start..start + buf.len()]);
        Ok(())
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        if !self.geometry.is_sector_aligned(offset) {
            return Err(FlashError::NotAligned);
        }
        if self.fail_erase_from.is_some_and(|from| offset >= from) {
            return Err(FlashError::Erase);
        }
        let sector = self.geometry.sector_size as usize;
        let start = self.check(offset, sector)?;
        self.data[start..start + sector].fill(0xFF);
        self.erases += 1;
        Ok(())
    }

    fn program_page(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashError> {
        if self.fail_program {
            return Err(FlashError::Program);
        }
        if !self.geometry.is_page_aligned(offset) || bytes.len() > self.geometry.page_size as usize
        {
            return Err(FlashError::NotAligned);
        }
        let start = self.check(offset, bytes.len())?;
        for (cell, b) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
            *cell &= *b;
        }
        self.programs += 1;
        Ok(())
    }
}

/// Busy-wait stand-in that returns immediately
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Port returning an incrementing counter, with `clock_bit` set once the
/// counter reaches `clock_high_from`
pub struct CountingPort {
    pub reads: u32,
    pub clock_bit: u8,
    pub clock_high_from: u32,
}

impl PortSampler for CountingPort {
    fn read_all(&mut self) -> u32 {
        let n = self.reads;
        self.reads += 1;
        if n >= self.clock_high_from {
            n | (1 << self.clock_bit)
        } else {
            n
        }
    }
}

/// Records every `drive` call
#[derive(Default)]
pub struct RecordingLines {
    pub driven: Vec<(bool, bool)>,
}

impl LineDriver for RecordingLines {
    fn drive(&mut self, data: bool, clock: bool) {
        self.driven.push((data, clock));
    }
}

/// Simulated time base; every line read advances it by one microsecond
pub struct SimClock<'a> {
    pub now: &'a Cell<u32>,
}

impl MicrosClock for SimClock<'_> {
    fn now_us(&self) -> u32 {
        self.now.get()
    }
}

/// Line that is high during the `[start, end)` windows of `pulses`
pub struct PulseLine<'a> {
    pub now: &'a Cell<u32>,
    pub pulses: &'a [(u32, u32)],
    pub invert: bool,
}

impl InputPin for PulseLine<'_> {
    fn is_high(&mut self) -> bool {
        let t = self.now.get();
        self.now.set(t + 1);
        let high = self.pulses.iter().any(|&(s, e)| t >= s && t < e);
        high != self.invert
    }
}

/// Line stuck at one level
pub struct StuckLine(pub bool);

impl InputPin for StuckLine {
    fn is_high(&mut self) -> bool {
        self.0
    }
}
