//! Hex import session
//!
//! Feeds console characters through a [`HexParser`] into the live buffer,
//! one capture per slot. The caller erases the store once before the
//! session starts; the session itself only appends.

use tracewire_protocol::{Feed, HexParser, ImportedCapture};

use crate::buffer::CaptureBuffer;
use crate::store::{CaptureSink, StoreError};

/// Source of import characters
pub trait CharSource {
    /// Next character, or `None` once the session has been cancelled
    fn next_char(&mut self) -> Option<u8>;
}

/// One accepted capture
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImportReport {
    pub capture: ImportedCapture,
    pub stored: Result<u32, StoreError>,
}

/// How a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ImportEnd {
    /// `!` received
    Aborted,
    /// `limit` captures accepted
    Filled,
    /// Character source cancelled
    Cancelled,
}

#[derive(Debug, Default)]
pub struct ImportSession {
    parser: HexParser,
}

impl ImportSession {
    pub const fn new() -> Self {
        Self {
            parser: HexParser::new(),
        }
    }

    /// Import up to `limit` captures
    ///
    /// The buffer is zeroed before each capture, so a short capture is
    /// padded with zero words. Each `;` hands the buffer to `sink` before
    /// the next capture's input is read.
    pub fn run<C, K, R, const W: usize>(
        &mut self,
        source: &mut C,
        buffer: &mut CaptureBuffer<W>,
        sink: &mut K,
        limit: u32,
        mut report: R,
    ) -> ImportEnd
    where
        C: CharSource,
        K: CaptureSink<W>,
        R: FnMut(ImportReport),
    {
        let mut accepted = 0;
        while accepted < limit {
            buffer.clear();
            self.parser.reset();

            loop {
                let Some(c) = source.next_char() else {
                    return ImportEnd::Cancelled;
                };
                match self.parser.feed(c, buffer) {
                    Feed::Continue => {}
                    Feed::SessionAbort => return ImportEnd::Aborted,
                    Feed::CaptureEnd(capture) => {
                        let stored = sink.persist(buffer);
                        if stored == Err(StoreError::Cancelled) {
                            return ImportEnd::Cancelled;
                        }
                        report(ImportReport { capture, stored });
                        accepted += 1;
                        break;
                    }
                }
            }
        }
        ImportEnd::Filled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RamFlash;
    use crate::store::FlashCaptureStore;
    use heapless::String;
    use std::vec::Vec;
    use tracewire_protocol::export::{write_capture, write_label, write_summary};

    const W: usize = 8;
    type Store = FlashCaptureStore<RamFlash, W>;

    // 4 slots of 32 bytes behind a 128 byte metadata sector
    fn store() -> Store {
        Store::new(RamFlash::new(128 + 4 * 32, 128, 32)).unwrap()
    }

    struct Text<'a> {
        bytes: &'a [u8],
        pos: usize,
    }

    impl CharSource for Text<'_> {
        fn next_char(&mut self) -> Option<u8> {
            let c = self.bytes.get(self.pos).copied();
            self.pos += 1;
            c
        }
    }

    fn import(text: &[u8], store: &mut Store) -> (ImportEnd, Vec<ImportReport>) {
        let mut buffer = CaptureBuffer::new();
        let mut reports = Vec::new();
        let limit = store.capacity();
        let end = ImportSession::new().run(
            &mut Text { bytes: text, pos: 0 },
            &mut buffer,
            store,
            limit,
            |r| reports.push(r),
        );
        (end, reports)
    }

    #[test]
    fn test_short_capture_padded_with_zeros() {
        let mut store = store();
        let (end, reports) = import(b"0x01 0x02 0x03 0x04 0x05;!", &mut store);

        assert_eq!(end, ImportEnd::Aborted);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].capture.bytes, 5);
        assert_eq!(reports[0].stored, Ok(0));

        let mut out = CaptureBuffer::<W>::new();
        store.read_slot(0, &mut out).unwrap();
        assert_eq!(out.words()[0], 0x0403_0201);
        assert_eq!(out.words()[1], 0x0000_0005);
        assert!(out.words()[2..].iter().all(|w| *w == 0));
    }

    #[test]
    fn test_abort_discards_open_capture() {
        let mut store = store();
        let (end, reports) = import(b"0xAA;0xBB 0xCC!", &mut store);

        assert_eq!(end, ImportEnd::Aborted);
        assert_eq!(reports.len(), 1);
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_overlong_capture_truncated() {
        let mut store = store();
        let mut text = Vec::new();
        for i in 0..40u8 {
            text.extend_from_slice(b"0x");
            text.push(b"0123456789ABCDEF"[(i >> 4) as usize]);
            text.push(b"0123456789ABCDEF"[(i & 0xF) as usize]);
            text.push(b' ');
        }
        text.push(b';');

        let (end, reports) = import(&text, &mut store);

        assert_eq!(end, ImportEnd::Cancelled);
        assert_eq!(reports[0].capture.bytes, 32);
        assert_eq!(reports[0].capture.dropped, 8);
    }

    #[test]
    fn test_session_ends_when_store_full() {
        let mut store = store();
        let (end, reports) = import(b"0x01;0x02;0x03;0x04;0x05;", &mut store);

        assert_eq!(end, ImportEnd::Filled);
        assert_eq!(reports.len(), 4);
        assert_eq!(store.count(), 4);
    }

    #[test]
    fn test_source_exhausted_is_cancelled() {
        let mut store = store();
        let (end, reports) = import(b"0x01 0x02", &mut store);
        assert_eq!(end, ImportEnd::Cancelled);
        assert!(reports.is_empty());
        assert_eq!(store.count(), 0);
    }

    fn pattern(seed: u32) -> CaptureBuffer<W> {
        let mut buf = CaptureBuffer::new();
        for (i, w) in buf.words_mut().iter_mut().enumerate() {
            *w = seed.rotate_left(i as u32) ^ (i as u32 * 0x0101_0101);
        }
        buf
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn export_then_import_reproduces_store(seeds in proptest::collection::vec(any::<u32>(), 0..=4)) {
                let mut source = store();
                for seed in &seeds {
                    source.append(&pattern(*seed)).unwrap();
                }

                let mut text: String<4096> = String::new();
                let mut slot = CaptureBuffer::<W>::new();
                write_summary(&mut text, source.count()).unwrap();
                for i in 0..source.count() {
                    source.read_slot(i, &mut slot).unwrap();
                    write_label(&mut text, i).unwrap();
                    write_capture(&mut text, i, CaptureBuffer::<W>::BYTES, slot.bytes()).unwrap();
                }
                text.push('!').unwrap();

                let mut target = store();
                target.erase_all().unwrap();
                let (_, reports) = import(text.as_bytes(), &mut target);

                prop_assert_eq!(reports.len(), seeds.len());
                prop_assert_eq!(target.count(), source.count());
                let mut a = CaptureBuffer::<W>::new();
                let mut b = CaptureBuffer::<W>::new();
                for i in 0..source.count() {
                    source.read_slot(i, &mut a).unwrap();
                    target.read_slot(i, &mut b).unwrap();
                    prop_assert_eq!(&a, &b);
                }
            }
        }
    }
}
