//! Hex token import parser
//!
//! Consumes console text one character at a time and recognises `0xHH`
//! tokens (`x` or `X`, hex digits in either case). Each complete token
//! writes one byte into a [`ByteSink`] at the current cursor.
//!
//! ```text
//!          '0'                   'x'                        hex                       hex
//!  Idle ───────▶ SawLeadingZero ─────▶ ExpectHexNibbleHigh ─────▶ ExpectHexNibbleLow ─────▶ Idle (+ byte)
//!   ▲              │   ▲  │'0'                │                          │
//!   │              │   └──┘                   │                          │
//!   └─── other ────┴──────────── other ───────┴────────── other ─────────┘
//! ```
//!
//! `;` and `!` are recognised in every state before the table above applies.

/// Closes the current capture
pub const CAPTURE_TERMINATOR: u8 = b';';

/// Ends the whole import session
pub const SESSION_ABORT: u8 = b'!';

/// Parser state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParserState {
    /// Waiting for a leading '0'
    #[default]
    Idle,
    /// Seen '0' (or a run of them), waiting for 'x'
    SawLeadingZero,
    /// Seen "0x", waiting for the high nibble
    ExpectHexNibbleHigh,
    /// Waiting for the low nibble
    ExpectHexNibbleLow,
}

/// Outcome of a completed capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ImportedCapture {
    /// Bytes written into the sink
    pub bytes: usize,
    /// Tokens parsed after the sink was full
    pub dropped: usize,
}

/// Result of feeding one character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feed {
    /// Keep feeding
    Continue,
    /// `;` seen; the parser has already been reset for the next capture
    CaptureEnd(ImportedCapture),
    /// `!` seen; stop importing without closing the current capture
    SessionAbort,
}

/// Byte-addressed destination for imported bytes
pub trait ByteSink {
    /// Number of byte positions available
    fn byte_capacity(&self) -> usize;

    /// Store `byte` at `index` (always `< byte_capacity()`)
    fn put_byte(&mut self, index: usize, byte: u8);
}

impl ByteSink for [u8] {
    fn byte_capacity(&self) -> usize {
        self.len()
    }

    fn put_byte(&mut self, index: usize, byte: u8) {
        self[index] = byte;
    }
}

impl<const N: usize> ByteSink for [u8; N] {
    fn byte_capacity(&self) -> usize {
        N
    }

    fn put_byte(&mut self, index: usize, byte: u8) {
        self[index] = byte;
    }
}

/// Streaming `0xHH` token parser
#[derive(Debug, Clone, Default)]
pub struct HexParser {
    state: ParserState,
    high: u8,
    cursor: usize,
    dropped: usize,
}

impl HexParser {
    /// Create a parser in the idle state with the cursor at zero
    pub const fn new() -> Self {
        Self {
            state: ParserState::Idle,
            high: 0,
            cursor: 0,
            dropped: 0,
        }
    }

    /// Return to idle and rewind the cursor
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Current state
    pub fn state(&self) -> ParserState {
        self.state
    }

    /// Number of bytes written so far in this capture
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of tokens discarded because the sink was full
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Feed one character
    pub fn feed<S: ByteSink + ?Sized>(&mut self, c: u8, sink: &mut S) -> Feed {
        match c {
            CAPTURE_TERMINATOR => {
                let done = ImportedCapture {
                    bytes: self.cursor,
                    dropped: self.dropped,
                };
                self.reset();
                return Feed::CaptureEnd(done);
            }
            SESSION_ABORT => {
                self.state = ParserState::Idle;
                return Feed::SessionAbort;
            }
            _ => {}
        }

        self.state = match (self.state, c) {
            (ParserState::Idle, b'0') => ParserState::SawLeadingZero,
            (ParserState::Idle, _) => ParserState::Idle,
            (ParserState::SawLeadingZero, b'x' | b'X') => {
                self.high = 0;
                ParserState::ExpectHexNibbleHigh
            }
            (ParserState::SawLeadingZero, b'0') => ParserState::SawLeadingZero,
            (ParserState::SawLeadingZero, _) => ParserState::Idle,
            (ParserState::ExpectHexNibbleHigh, c) => match nibble(c) {
                Some(n) => {
                    self.high = n;
                    ParserState::ExpectHexNibbleLow
                }
                None => ParserState::Idle,
            },
            (ParserState::ExpectHexNibbleLow, c) => {
                if let Some(n) = nibble(c) {
                    self.emit((self.high << 4) | n, sink);
                }
                ParserState::Idle
            }
        };

        Feed::Continue
    }

    /// Feed a whole slice, stopping at the first terminator or abort
    ///
    /// Returns the outcome and how many characters were consumed.
    pub fn feed_all<S: ByteSink + ?Sized>(&mut self, text: &[u8], sink: &mut S) -> (Feed, usize) {
        for (i, &c) in text.iter().enumerate() {
            match self.feed(c, sink) {
                Feed::Continue => {}
                done => return (done, i + 1),
            }
        }
        (Feed::Continue, text.len())
    }

    fn emit<S: ByteSink + ?Sized>(&mut self, byte: u8, sink: &mut S) {
        if self.cursor < sink.byte_capacity() {
            sink.put_byte(self.cursor, byte);
            self.cursor += 1;
        } else {
            self.dropped += 1;
        }
    }
}

fn nibble(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}
