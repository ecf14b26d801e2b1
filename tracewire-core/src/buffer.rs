//! Live capture buffer
//!
//! One word per sample, each word a snapshot of the whole input port. The
//! byte view used by flash, export and import is little-endian per word, so
//! byte `i` is bits `8 * (i % 4)..` of word `i / 4`.

use tracewire_protocol::ByteSink;

/// Fixed-length capture of `W` port snapshots
#[derive(Clone, PartialEq, Eq)]
pub struct CaptureBuffer<const W: usize> {
    words: [u32; W],
}

impl<const W: usize> Default for CaptureBuffer<W> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const W: usize> core::fmt::Debug for CaptureBuffer<W> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CaptureBuffer")
            .field("words", &W)
            .finish_non_exhaustive()
    }
}

impl<const W: usize> CaptureBuffer<W> {
    /// Samples per capture
    pub const WORDS: usize = W;
    /// Serialized size in bytes
    pub const BYTES: usize = W * 4;

    /// A zeroed buffer, usable in `static` initialisers
    pub const fn new() -> Self {
        Self { words: [0; W] }
    }

    pub fn words(&self) -> &[u32; W] {
        &self.words
    }

    pub fn words_mut(&mut self) -> &mut [u32; W] {
        &mut self.words
    }

    /// Zero every sample
    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    /// Byte `index` of the little-endian view
    pub fn byte(&self, index: usize) -> u8 {
        (self.words[index / 4] >> ((index % 4) * 8)) as u8
    }

    /// Overwrite byte `index` of the little-endian view
    pub fn set_byte(&mut self, index: usize, byte: u8) {
        let shift = (index % 4) * 8;
        let word = &mut self.words[index / 4];
        *word = (*word & !(0xFF << shift)) | ((byte as u32) << shift);
    }

    /// Iterate the little-endian byte view
    pub fn bytes(&self) -> impl Iterator<Item = u8> + '_ {
        self.words.iter().flat_map(|w| w.to_le_bytes())
    }

    /// Serialize words starting at `first_word` into `out`
    ///
    /// `out.len()` must be a multiple of 4.
    pub fn store_le(&self, first_word: usize, out: &mut [u8]) {
        for (chunk, word) in out.chunks_exact_mut(4).zip(&self.words[first_word..]) {
            chunk.copy_from_slice(&word.to_le_bytes());
        }
    }

    /// Deserialize `bytes` into words starting at `first_word`
    ///
    /// `bytes.len()` must be a multiple of 4.
    pub fn load_le(&mut self, first_word: usize, bytes: &[u8]) {
        for (word, chunk) in self.words[first_word..].iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
    }
}

impl<const W: usize> ByteSink for CaptureBuffer<W> {
    fn byte_capacity(&self) -> usize {
        Self::BYTES
    }

    fn put_byte(&mut self, index: usize, byte: u8) {
        self.set_byte(index, byte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_view_is_little_endian() {
        let mut buf: CaptureBuffer<2> = CaptureBuffer::new();
        buf.words_mut()[0] = 0x0033_EC03;
        buf.words_mut()[1] = 0xAABB_CCDD;

        assert_eq!(buf.byte(0), 0x03);
        assert_eq!(buf.byte(1), 0xEC);
        assert_eq!(buf.byte(2), 0x33);
        assert_eq!(buf.byte(3), 0x00);
        assert_eq!(buf.byte(4), 0xDD);

        let mut bytes = [0u8; 8];
        for (i, b) in buf.bytes().enumerate() {
            bytes[i] = b;
        }
        assert_eq!(bytes, [0x03, 0xEC, 0x33, 0x00, 0xDD, 0xCC, 0xBB, 0xAA]);
    }

    #[test]
    fn test_set_byte_preserves_neighbours() {
        let mut buf: CaptureBuffer<1> = CaptureBuffer::new();
        buf.words_mut()[0] = 0x1122_3344;
        buf.set_byte(2, 0xFF);
        assert_eq!(buf.words()[0], 0x11FF_3344);
    }

    #[test]
    fn test_store_and_load_le_chunks() {
        let mut src: CaptureBuffer<4> = CaptureBuffer::new();
        src.words_mut().copy_from_slice(&[1, 2, 0xDEAD_BEEF, 4]);

        let mut chunk = [0u8; 8];
        src.store_le(2, &mut chunk);
        assert_eq!(chunk, [0xEF, 0xBE, 0xAD, 0xDE, 4, 0, 0, 0]);

        let mut dst: CaptureBuffer<4> = CaptureBuffer::new();
        dst.load_le(2, &chunk);
        assert_eq!(dst.words(), &[0, 0, 0xDEAD_BEEF, 4]);
    }

    #[test]
    fn test_clear() {
        let mut buf: CaptureBuffer<3> = CaptureBuffer::new();
        buf.words_mut().fill(u32::MAX);
        buf.clear();
        assert!(buf.words().iter().all(|w| *w == 0));
    }
}
