//! Flash region abstractions
//!
//! A [`FlashRegion`] is a window of memory-mapped NOR flash reserved for
//! capture storage. NOR rules apply: erase sets every bit of a whole sector
//! to 1, program can only clear bits to 0, and a region offset is always
//! relative to the start of the window.

use embedded_storage::nor_flash::NorFlash;

/// Erase and program granularity supplied by the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct FlashGeometry {
    /// Smallest erasable unit in bytes
    pub sector_size: u32,
    /// Programming unit in bytes
    pub page_size: u32,
}

impl FlashGeometry {
    /// RP2040 QSPI flash (4 KiB sectors, 256 byte pages)
    pub const RP2040: Self = Self {
        sector_size: 4096,
        page_size: 256,
    };

    /// Round `len` up to a whole number of sectors
    pub fn sectors_for(&self, len: u32) -> u32 {
        len.div_ceil(self.sector_size) * self.sector_size
    }

    /// Check that `offset` starts a sector
    pub fn is_sector_aligned(&self, offset: u32) -> bool {
        offset % self.sector_size == 0
    }

    /// Check that `offset` starts a page
    pub fn is_page_aligned(&self, offset: u32) -> bool {
        offset % self.page_size == 0
    }
}

/// Errors from flash region operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FlashError {
    /// Access falls outside the region
    OutOfBounds,
    /// Offset or length not aligned to sector/page
    NotAligned,
    /// Erase operation failed
    Erase,
    /// Program operation failed
    Program,
    /// Read operation failed
    Read,
}

/// A reserved window of NOR flash
///
/// Implementations must not allow code execution from the window while an
/// erase or program is in progress. On memory-mapped flash any concurrent
/// fetch during erase/program is undefined behaviour.
pub trait FlashRegion {
    /// Erase/program geometry
    fn geometry(&self) -> FlashGeometry;

    /// Size of the region in bytes
    fn len(&self) -> u32;

    /// Copy `buf.len()` bytes starting at `offset` into `buf`
    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError>;

    /// Erase the sector starting at `offset`
    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError>;

    /// Program one page starting at `offset`
    ///
    /// `bytes` must not be longer than a page. The target must have been
    /// erased since it was last programmed.
    fn program_page(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashError>;

    /// Erase every sector in `from..to`
    ///
    /// Both bounds must be sector aligned. Platforms with a faster block
    /// erase should override this.
    fn erase_range(&mut self, from: u32, to: u32) -> Result<(), FlashError> {
        let geometry = self.geometry();
        if !geometry.is_sector_aligned(from) || !geometry.is_sector_aligned(to) {
            return Err(FlashError::NotAligned);
        }
        let mut offset = from;
        while offset < to {
            self.erase_sector(offset)?;
            offset += geometry.sector_size;
        }
        Ok(())
    }

    /// Run `f` with interrupts masked on the calling core
    ///
    /// Groups several erase/program operations into one window. The default
    /// runs `f` directly, for platforms where nothing else can preempt.
    fn exclusive<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R
    where
        Self: Sized,
    {
        f(self)
    }

    /// Check if the region has zero size
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// [`FlashRegion`] window over any `embedded-storage` NOR flash device
///
/// `base` is the absolute device offset of the window. Sector size comes
/// from `F::ERASE_SIZE`; the page size is supplied by the caller because
/// `embedded-storage` has no notion of a program page.
pub struct NorFlashRegion<F> {
    flash: F,
    base: u32,
    len: u32,
    page_size: u32,
}

impl<F: NorFlash> NorFlashRegion<F> {
    /// Create a window of `len` bytes at device offset `base`
    ///
    /// Returns `NotAligned` if the window does not start and end on sector
    /// boundaries, or `OutOfBounds` if it runs past the device.
    pub fn new(flash: F, base: u32, len: u32, page_size: u32) -> Result<Self, FlashError> {
        let sector = F::ERASE_SIZE as u32;
        if base % sector != 0 || len % sector != 0 || page_size == 0 {
            return Err(FlashError::NotAligned);
        }
        let end = base.checked_add(len).ok_or(FlashError::OutOfBounds)?;
        if end as usize > flash.capacity() {
            return Err(FlashError::OutOfBounds);
        }
        Ok(Self {
            flash,
            base,
            len,
            page_size,
        })
    }

    /// Absolute device offset of the window
    pub fn base(&self) -> u32 {
        self.base
    }

    /// Get the underlying flash device
    pub fn inner(&mut self) -> &mut F {
        &mut self.flash
    }

    /// Release the underlying flash device
    pub fn into_inner(self) -> F {
        self.flash
    }

    fn check(&self, offset: u32, len: usize) -> Result<u32, FlashError> {
        let end = offset
            .checked_add(len as u32)
            .ok_or(FlashError::OutOfBounds)?;
        if end > self.len {
            return Err(FlashError::OutOfBounds);
        }
        Ok(self.base + offset)
    }
}

impl<F: NorFlash> FlashRegion for NorFlashRegion<F> {
    fn geometry(&self) -> FlashGeometry {
        FlashGeometry {
            sector_size: F::ERASE_SIZE as u32,
            page_size: self.page_size,
        }
    }

    fn len(&self) -> u32 {
        self.len
    }

    fn read(&mut self, offset: u32, buf: &mut [u8]) -> Result<(), FlashError> {
        let absolute = self.check(offset, buf.len())?;
        self.flash
            .read(absolute, buf)
            .map_err(|_| FlashError::Read)
    }

    fn erase_sector(&mut self, offset: u32) -> Result<(), FlashError> {
        let sector = F::ERASE_SIZE as u32;
        if offset % sector != 0 {
            return Err(FlashError::NotAligned);
        }
        let absolute = self.check(offset, sector as usize)?;
        self.flash
            .erase(absolute, absolute + sector)
            .map_err(|_| FlashError::Erase)
    }

    fn program_page(&mut self, offset: u32, bytes: &[u8]) -> Result<(), FlashError> {
        if offset % self.page_size != 0 {
            return Err(FlashError::NotAligned);
        }
        if bytes.len() as u32 > self.page_size {
            return Err(FlashError::OutOfBounds);
        }
        let absolute = self.check(offset, bytes.len())?;
        self.flash
            .write(absolute, bytes)
            .map_err(|_| FlashError::Program)
    }

    fn erase_range(&mut self, from: u32, to: u32) -> Result<(), FlashError> {
        let sector = F::ERASE_SIZE as u32;
        if from % sector != 0 || to % sector != 0 || from > to {
            return Err(FlashError::NotAligned);
        }
        let start = self.check(from, (to - from) as usize)?;
        self.flash
            .erase(start, start + (to - from))
            .map_err(|_| FlashError::Erase)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_storage::nor_flash::{ErrorType, NorFlashErrorKind, ReadNorFlash};

    const DEVICE_SIZE: usize = 4 * 256;

    /// RAM-backed NOR device with 256 byte sectors
    struct MockNor {
        data: [u8; DEVICE_SIZE],
    }

    impl MockNor {
        fn new() -> Self {
            Self {
                data: [0xFF; DEVICE_SIZE],
            }
        }
    }

    impl ErrorType for MockNor {
        type Error = NorFlashErrorKind;
    }

    impl ReadNorFlash for MockNor {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            bytes.copy_from_slice(&self.data[start..start + bytes.len()]);
            Ok(())
        }

        fn capacity(&self) -> usize {
            DEVICE_SIZE
        }
    }

    impl NorFlash for MockNor {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = 256;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            self.data[from as usize..to as usize].fill(0xFF);
            Ok(())
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            let start = offset as usize;
            for (cell, byte) in self.data[start..start + bytes.len()].iter_mut().zip(bytes) {
                *cell &= *byte;
            }
            Ok(())
        }
    }

    #[test]
    fn test_window_offsets_are_relative() {
        let mut region = NorFlashRegion::new(MockNor::new(), 512, 512, 64).unwrap();
        region.program_page(0, &[0x12, 0x34]).unwrap();

        assert_eq!(region.inner().data[512], 0x12);
        assert_eq!(region.inner().data[513], 0x34);
        assert_eq!(region.inner().data[0], 0xFF);

        let mut buf = [0u8; 2];
        region.read(0, &mut buf).unwrap();
        assert_eq!(buf, [0x12, 0x34]);
    }

    #[test]
    fn test_rejects_unaligned_window() {
        assert!(matches!(
            NorFlashRegion::new(MockNor::new(), 100, 256, 64),
            Err(FlashError::NotAligned)
        ));
        assert!(matches!(
            NorFlashRegion::new(MockNor::new(), 768, 512, 64),
            Err(FlashError::OutOfBounds)
        ));
    }

    #[test]
    fn test_bounds_checked() {
        let mut region = NorFlashRegion::new(MockNor::new(), 0, 256, 64).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(region.read(254, &mut buf), Err(FlashError::OutOfBounds));
        assert_eq!(region.program_page(10, &[0]), Err(FlashError::NotAligned));
        assert_eq!(region.program_page(0, &[0u8; 65]), Err(FlashError::OutOfBounds));
        assert_eq!(region.erase_sector(256), Err(FlashError::OutOfBounds));
    }

    #[test]
    fn test_erase_restores_ones() {
        let mut region = NorFlashRegion::new(MockNor::new(), 256, 512, 64).unwrap();
        region.program_page(256, &[0u8; 64]).unwrap();
        region.erase_range(0, 512).unwrap();

        let mut buf = [0u8; 64];
        region.read(256, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn test_geometry_helpers() {
        let geometry = FlashGeometry::RP2040;
        assert_eq!(geometry.sectors_for(1), 4096);
        assert_eq!(geometry.sectors_for(4096), 4096);
        assert_eq!(geometry.sectors_for(4097), 8192);
        assert!(geometry.is_page_aligned(512));
        assert!(!geometry.is_sector_aligned(512));
    }
}
