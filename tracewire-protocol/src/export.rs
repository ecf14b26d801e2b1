//! C-initializer export of stored captures
//!
//! One capture becomes one line:
//!
//! ```text
//! unsigned char array_3[4] = { 0x03, 0xEC, 0x33, 0x00 };
//! ```
//!
//! The byte list is the capture window in little-endian order, so the output
//! can be pasted back through the hex importer unchanged.

use core::fmt::{self, Write};

/// Write the "Total captures" header line
pub fn write_summary<W: Write>(out: &mut W, total: u32) -> fmt::Result {
    write!(out, "Total captures stored in flash: {}\r\n", total)
}

/// Write the per-capture label line
pub fn write_label<W: Write>(out: &mut W, index: u32) -> fmt::Result {
    write!(out, "capture {}:\r\n", index)
}

/// Write one capture as a C array initializer
///
/// `len` must match the number of bytes `bytes` yields; it is the declared
/// array size.
pub fn write_capture<W, I>(out: &mut W, index: u32, len: usize, bytes: I) -> fmt::Result
where
    W: Write,
    I: IntoIterator<Item = u8>,
{
    write!(out, "unsigned char array_{}[{}] = {{ ", index, len)?;

    let mut first = true;
    let mut token = [b'0', b'x', 0, 0];
    for byte in bytes {
        if !first {
            out.write_str(", ")?;
        }
        first = false;
        token[2] = HEX[(byte >> 4) as usize];
        token[3] = HEX[(byte & 0x0F) as usize];
        // token is always ASCII
        out.write_str(core::str::from_utf8(&token).map_err(|_| fmt::Error)?)?;
    }

    out.write_str(" };\r\n")
}

const HEX: &[u8; 16] = b"0123456789ABCDEF";

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    /// Counts characters without storing them
    #[derive(Default)]
    struct Counter(usize);

    impl Write for Counter {
        fn write_str(&mut self, s: &str) -> fmt::Result {
            self.0 += s.len();
            Ok(())
        }
    }

    #[test]
    fn test_small_capture_line() {
        let mut out: String<128> = String::new();
        write_capture(&mut out, 0, 4, [0x03, 0xEC, 0x33, 0x00]).unwrap();

        assert_eq!(
            out.as_str(),
            "unsigned char array_0[4] = { 0x03, 0xEC, 0x33, 0x00 };\r\n"
        );
    }

    #[test]
    fn test_summary_and_label() {
        let mut out: String<128> = String::new();
        write_summary(&mut out, 3).unwrap();
        write_label(&mut out, 2).unwrap();

        assert_eq!(
            out.as_str(),
            "Total captures stored in flash: 3\r\ncapture 2:\r\n"
        );
    }

    #[test]
    fn test_full_window_line_length() {
        // 40960 words -> 163840 bytes
        let n = 163_840usize;
        let mut counter = Counter::default();
        write_capture(&mut counter, 0, n, core::iter::repeat(0xFFu8).take(n)).unwrap();

        // "unsigned char array_0[163840] = { " is 34 chars, each byte 6 with
        // the last lacking ", ", then " };\r\n"
        assert_eq!(counter.0, 34 + 6 * n - 2 + 5);
    }

    #[test]
    fn test_export_reimports() {
        use crate::hex::{Feed, HexParser};

        let source = [0x00u8, 0x7F, 0x80, 0xFF, 0x5A];
        let mut out: String<256> = String::new();
        write_summary(&mut out, 1).unwrap();
        write_label(&mut out, 0).unwrap();
        write_capture(&mut out, 0, source.len(), source).unwrap();

        let mut parser = HexParser::new();
        let mut buf = [0u8; 5];
        let (feed, _) = parser.feed_all(out.as_bytes(), &mut buf);

        assert!(matches!(feed, Feed::CaptureEnd(c) if c.bytes == 5));
        assert_eq!(buf, source);
    }

    #[test]
    fn test_buffer_too_small_reports_error() {
        let mut out: String<16> = String::new();
        assert!(write_capture(&mut out, 0, 4, [1, 2, 3, 4]).is_err());
    }
}
