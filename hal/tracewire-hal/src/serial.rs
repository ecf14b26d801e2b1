//! Serial console abstraction
//!
//! The operator console is a plain byte stream. The supervising core needs
//! to poll it without blocking while a worker runs, hence `read_ready`.

/// Operator console port
pub trait SerialPort {
    /// Error type for console operations
    type Error;

    /// Write all of `data`, blocking until it is queued
    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Read one byte, blocking until it arrives
    fn read_byte(&mut self) -> Result<u8, Self::Error>;

    /// Check whether a byte can be read without blocking
    fn read_ready(&mut self) -> bool;

    /// Read one byte if available
    fn try_read_byte(&mut self) -> Result<Option<u8>, Self::Error> {
        if self.read_ready() {
            self.read_byte().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Discard everything currently buffered on the receive side
    fn drain_input(&mut self) -> Result<(), Self::Error> {
        while self.try_read_byte()?.is_some() {}
        Ok(())
    }
}
