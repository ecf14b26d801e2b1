//! Operator console over UART0
//!
//! Wraps the split buffered UART halves behind the blocking
//! [`SerialPort`] interface; the interrupt-driven ring buffers keep
//! keystrokes while core0 is busy in a supervision loop. The menu waits for
//! keys with [`Console::read_key`], which yields to the executor instead.

use embassy_rp::uart::{BufferedUartRx, BufferedUartTx, Error};
use embedded_io::{Read, ReadReady, Write};
use tracewire_hal::SerialPort;

/// Console error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleError {
    Uart(Error),
    /// Read returned no data
    Empty,
}

impl From<Error> for ConsoleError {
    fn from(e: Error) -> Self {
        ConsoleError::Uart(e)
    }
}

pub struct Console {
    tx: BufferedUartTx,
    rx: BufferedUartRx,
}

impl Console {
    pub fn new(tx: BufferedUartTx, rx: BufferedUartRx) -> Self {
        Self { tx, rx }
    }

    /// Wait for the next key without spinning
    pub async fn read_key(&mut self) -> Result<u8, ConsoleError> {
        let mut byte = [0u8; 1];
        match embedded_io_async::Read::read(&mut self.rx, &mut byte).await? {
            0 => Err(ConsoleError::Empty),
            _ => Ok(byte[0]),
        }
    }
}

impl SerialPort for Console {
    type Error = ConsoleError;

    fn write_blocking(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.tx.write_all(data)?;
        self.tx.flush()?;
        Ok(())
    }

    fn read_byte(&mut self) -> Result<u8, Self::Error> {
        let mut byte = [0u8; 1];
        match self.rx.read(&mut byte)? {
            0 => Err(ConsoleError::Empty),
            _ => Ok(byte[0]),
        }
    }

    fn read_ready(&mut self) -> bool {
        self.rx.read_ready().unwrap_or(false)
    }
}

impl core::fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> core::fmt::Result {
        self.write_blocking(s.as_bytes()).map_err(|_| core::fmt::Error)
    }
}
