//! Append-only flash capture store
//!
//! Region layout (offsets relative to the region start):
//!
//! ```text
//! 0                 sector_size        + slot_size       + 2 * slot_size
//! ┌──────────────────┬──────────────────┬─────────────────┬─── ...
//! │ metadata sector  │ slot 0           │ slot 1          │
//! │ [last index: LE] │ W words, LE      │ W words, LE     │
//! └──────────────────┴──────────────────┴─────────────────┴─── ...
//! ```
//!
//! The metadata page holds the last written slot index; `0xFFFF_FFFF` (the
//! erased state) means empty. Data sectors are only erased by
//! [`FlashCaptureStore::erase_all`], so each slot is programmed exactly once
//! between full erases.

use tracewire_hal::{FlashError, FlashRegion};

use crate::buffer::CaptureBuffer;

/// Largest program page the store can stage
pub const MAX_PAGE_SIZE: usize = 256;

const EMPTY_SENTINEL: u32 = 0xFFFF_FFFF;
const META_OFFSET: u32 = 0;

/// Capture store errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    /// Every slot is in use; flash was not touched
    StoreFull,
    /// Slot index at or beyond `count()`
    IndexOutOfRange,
    /// Erase or program failed part way
    FlashWriteInconsistent,
    /// Flash read failed
    FlashRead,
    /// Region cannot hold metadata plus at least one slot, or its page
    /// size does not hold a whole number of words
    InvalidGeometry,
    /// The operation was abandoned because the task was stopped
    Cancelled,
}

impl StoreError {
    /// Stable wire code, never zero
    pub fn code(self) -> u8 {
        match self {
            StoreError::StoreFull => 1,
            StoreError::IndexOutOfRange => 2,
            StoreError::FlashWriteInconsistent => 3,
            StoreError::FlashRead => 4,
            StoreError::InvalidGeometry => 5,
            StoreError::Cancelled => 6,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(StoreError::StoreFull),
            2 => Some(StoreError::IndexOutOfRange),
            3 => Some(StoreError::FlashWriteInconsistent),
            4 => Some(StoreError::FlashRead),
            5 => Some(StoreError::InvalidGeometry),
            6 => Some(StoreError::Cancelled),
            _ => None,
        }
    }
}

/// Anything a finished capture can be handed to for persistence
pub trait CaptureSink<const W: usize> {
    /// Persist `buffer`, returning the slot it landed in
    fn persist(&mut self, buffer: &CaptureBuffer<W>) -> Result<u32, StoreError>;
}

/// Capture store over a reserved flash region
pub struct FlashCaptureStore<F: FlashRegion, const W: usize> {
    region: F,
    /// Cached metadata word, `None` when empty
    last: Option<u32>,
    capacity: u32,
    /// Set by a failed full erase; blocks appends until one succeeds
    needs_erase: bool,
}

impl<F: FlashRegion, const W: usize> FlashCaptureStore<F, W> {
    /// Serialized slot size in bytes
    pub const SLOT_SIZE: u32 = (W * 4) as u32;

    /// Mount a store on `region` and read its metadata
    ///
    /// The first sector holds metadata; the rest is divided into slots.
    pub fn new(mut region: F) -> Result<Self, StoreError> {
        let geometry = region.geometry();
        let page = geometry.page_size;
        if page < 4
            || page % 4 != 0
            || page as usize > MAX_PAGE_SIZE
            || Self::SLOT_SIZE == 0
            || Self::SLOT_SIZE % page != 0
            || region.len() <= geometry.sector_size
        {
            return Err(StoreError::InvalidGeometry);
        }

        let capacity = (region.len() - geometry.sector_size) / Self::SLOT_SIZE;
        if capacity == 0 {
            return Err(StoreError::InvalidGeometry);
        }

        let last = read_meta(&mut region)?;
        Ok(Self {
            region,
            last,
            capacity,
            needs_erase: false,
        })
    }

    /// Number of slots the region holds
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of slots written since the last full erase
    pub fn count(&self) -> u32 {
        match self.last {
            Some(last) => last.saturating_add(1),
            None => 0,
        }
    }

    /// True when the next append would be refused
    pub fn is_full(&self) -> bool {
        self.needs_erase || self.count() >= self.capacity
    }

    /// Re-read the metadata page
    pub fn refresh(&mut self) -> Result<(), StoreError> {
        self.last = read_meta(&mut self.region)?;
        Ok(())
    }

    /// Append `buffer` to the next free slot
    ///
    /// Erases and reprograms the metadata page, then programs the slot, all
    /// inside one exclusive flash window. A full store returns `StoreFull`
    /// without issuing any flash operation, as does a store whose last full
    /// erase failed.
    pub fn append(&mut self, buffer: &CaptureBuffer<W>) -> Result<u32, StoreError> {
        if self.is_full() {
            return Err(StoreError::StoreFull);
        }
        let next = self.count();

        let slot_offset = self.slot_offset(next);
        let mut meta_written = false;

        let result = self.region.exclusive(|region| -> Result<(), FlashError> {
            let page = region.geometry().page_size as usize;
            let mut staging = [0u8; MAX_PAGE_SIZE];

            region.erase_sector(META_OFFSET)?;
            staging[..4].copy_from_slice(&next.to_le_bytes());
            region.program_page(META_OFFSET, &staging[..page])?;
            meta_written = true;

            let words_per_page = page / 4;
            let mut word = 0;
            let mut offset = slot_offset;
            while word < W {
                buffer.store_le(word, &mut staging[..page]);
                region.program_page(offset, &staging[..page])?;
                word += words_per_page;
                offset += page as u32;
            }
            Ok(())
        });

        if meta_written {
            self.last = Some(next);
        }
        result.map_err(|_| StoreError::FlashWriteInconsistent)?;
        Ok(next)
    }

    /// Copy slot `index` into `buffer`
    pub fn read_slot(&mut self, index: u32, buffer: &mut CaptureBuffer<W>) -> Result<(), StoreError> {
        if index >= self.count() {
            return Err(StoreError::IndexOutOfRange);
        }

        let mut chunk = [0u8; MAX_PAGE_SIZE];
        let chunk_words = MAX_PAGE_SIZE / 4;
        let mut offset = self.slot_offset(index);
        let mut word = 0;
        while word < W {
            let words = chunk_words.min(W - word);
            let bytes = &mut chunk[..words * 4];
            self.region
                .read(offset, bytes)
                .map_err(|_| StoreError::FlashRead)?;
            buffer.load_le(word, bytes);
            word += words;
            offset += (words * 4) as u32;
        }
        Ok(())
    }

    /// Erase metadata and every slot
    ///
    /// On failure some slots may still hold old data under fresh metadata,
    /// so the store refuses appends until a later `erase_all` succeeds.
    pub fn erase_all(&mut self) -> Result<(), StoreError> {
        let len = self.region.len();
        let result = self.region.exclusive(|region| region.erase_range(0, len));
        match result {
            Ok(()) => {
                self.last = None;
                self.needs_erase = false;
                Ok(())
            }
            Err(_) => {
                self.needs_erase = true;
                // Reads follow whatever the metadata now says
                self.last = read_meta(&mut self.region).unwrap_or(None);
                Err(StoreError::FlashWriteInconsistent)
            }
        }
    }

    pub fn region(&self) -> &F {
        &self.region
    }

    pub fn region_mut(&mut self) -> &mut F {
        &mut self.region
    }

    fn slot_offset(&self, index: u32) -> u32 {
        self.region.geometry().sector_size + index * Self::SLOT_SIZE
    }
}

impl<F: FlashRegion, const W: usize> CaptureSink<W> for FlashCaptureStore<F, W> {
    fn persist(&mut self, buffer: &CaptureBuffer<W>) -> Result<u32, StoreError> {
        self.append(buffer)
    }
}

fn read_meta<F: FlashRegion>(region: &mut F) -> Result<Option<u32>, StoreError> {
    let mut word = [0u8; 4];
    region
        .read(META_OFFSET, &mut word)
        .map_err(|_| StoreError::FlashRead)?;
    match u32::from_le_bytes(word) {
        EMPTY_SENTINEL => Ok(None),
        last => Ok(Some(last)),
    }
}
