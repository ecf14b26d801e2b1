//! Tracewire operator text protocol
//!
//! Everything the operator types into, or copies out of, the serial console:
//!
//! - [`hex`]: a character-at-a-time parser that pulls `0xHH` tokens out of
//!   free text and writes the bytes into a capture
//! - [`export`]: the matching C-initializer dump of stored captures
//! - [`menu`]: numbered menu selection, confirmations and index entry
//!
//! # Text format
//!
//! ```text
//! Total captures stored in flash: 2
//! capture 0:
//! unsigned char array_0[4] = { 0x03, 0xEC, 0x33, 0x00 };
//! capture 1:
//! unsigned char array_1[4] = { 0x1A, 0x2B, 0x00, 0x00 };
//! !
//! ```
//!
//! `;` closes one capture, `!` ends the import session. Anything that is not
//! part of a well-formed `0xHH` token is ignored, so an export can be pasted
//! straight back in.

#![no_std]
#![deny(unsafe_code)]

pub mod export;
pub mod hex;
pub mod menu;

pub use export::{write_capture, write_label, write_summary};
pub use hex::{ByteSink, Feed, HexParser, ImportedCapture, ParserState};
pub use menu::{is_confirmation, LineEvent, LineInput, MenuCommand, MenuError};
