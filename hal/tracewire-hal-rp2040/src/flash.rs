//! Capture flash region for RP2040
//!
//! The region occupies the top of the 2 MB flash: one metadata sector and
//! 400 data sectors (ten 160 KiB slots). `memory.x` keeps the program image
//! below [`CAPTURE_REGION_OFFSET`].
//!
//! embassy-rp refuses erase/program from core1 and pauses core1 itself
//! around each operation, so every write must be issued from core0.

use embassy_rp::flash::{Blocking, Flash, ERASE_SIZE, PAGE_SIZE};
use embassy_rp::peripherals::FLASH;
use embassy_rp::Peri;
use tracewire_hal::{FlashError, FlashGeometry, FlashRegion, NorFlashRegion};

/// Flash size on Pico-class boards
pub const FLASH_SIZE: usize = 2 * 1024 * 1024;

/// Metadata sector plus 0x190 data sectors
pub const CAPTURE_REGION_LEN: u32 = (1 + 0x190) * ERASE_SIZE as u32;

/// Absolute flash offset of the capture region
pub const CAPTURE_REGION_OFFSET: u32 = FLASH_SIZE as u32 - CAPTURE_REGION_LEN;

type RpFlash = Flash<'static, FLASH, Blocking, FLASH_SIZE>;

/// The reserved capture window of the on-board flash
pub struct CaptureRegion {
    inner: NorFlashRegion<RpFlash>,
}

impl CaptureRegion {
    /// Take the flash peripheral and map the capture window
    pub fn new(flash: Peri<'static, FLASH>) -> Result<Self, FlashError> {
        let flash = RpFlash::new_blocking(flash);
        let inner = NorFlashRegion::new(
            flash,
            CAPTURE_REGION_OFFSET,
            CAPTURE_REGION_LEN,
            PAGE_SIZE as u32,
        )?;
        Ok(Self { inner })
    }

    /// Absolute flash offset of the window
    pub fn base(&self) -> u32 {
        self.inner.base()
    }
}

impl FlashRegion for CaptureRegion {
    fn geometry(&self) -> FlashGeometry {
        self.inner.geometry()
    }

    fn len(&self) -> u32 {
        self.inner.len()
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        self.inner.read(offset, buf)
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        self.inner.erase_sector(offset)
    }

    fn program_page(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashError> {
        self.inner.program_page(offset, bytes)
    }

    fn erase_range(&mut self, from: u32, to: u32) -> Result<(), FlashError> {
        self.inner.erase_range(from, to)
    }

    /// Masks interrupts on core0 for the whole group of operations
    fn exclusive<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        cortex_m::interrupt::free(|_| f(self))
    }
}
