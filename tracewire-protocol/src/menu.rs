//! Console menu decoding
//!
//! The menu is a single keypress per selection. Dangerous operations ask for
//! a `y`/`Y` confirmation; slot indices are typed as a decimal line.

use heapless::String;

/// Menu selections, keyed by digit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuCommand {
    /// Run the glitch detector on both units
    GlitchDetector,
    /// Capture, persist and replay in a loop
    CaptureReplay,
    /// Erase every stored capture
    EraseCaptures,
    /// Replay every stored capture in order
    ReplayAll,
    /// Dump stored captures as C arrays
    Export,
    /// Replay one stored capture by index
    ReplayOne,
    /// Import captures from pasted hex text
    Import,
    /// Erase the capture region and reboot to the USB boot ROM
    WipeAndReboot,
    /// Toggle the persisted performance mode and reboot
    TogglePerformance,
}

/// Menu input errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MenuError {
    /// Key does not map to a command
    InvalidMenuSelection(u8),
}

impl MenuCommand {
    /// All commands in menu order
    pub const ALL: [MenuCommand; 9] = [
        MenuCommand::GlitchDetector,
        MenuCommand::CaptureReplay,
        MenuCommand::EraseCaptures,
        MenuCommand::ReplayAll,
        MenuCommand::Export,
        MenuCommand::ReplayOne,
        MenuCommand::Import,
        MenuCommand::WipeAndReboot,
        MenuCommand::TogglePerformance,
    ];

    /// Decode a keypress
    pub fn from_key(key: u8) -> Result<Self, MenuError> {
        match key {
            b'0'..=b'8' => Ok(Self::ALL[(key - b'0') as usize]),
            _ => Err(MenuError::InvalidMenuSelection(key)),
        }
    }

    /// Key that selects this command
    pub fn key(self) -> u8 {
        let pos = Self::ALL.iter().position(|c| *c == self).unwrap_or(0);
        b'0' + pos as u8
    }

    /// Menu text
    pub fn label(self) -> &'static str {
        match self {
            Self::GlitchDetector => "Glitch detector",
            Self::CaptureReplay => "Capture / replay / store loop",
            Self::EraseCaptures => "Erase all stored captures",
            Self::ReplayAll => "Replay all stored captures",
            Self::Export => "Export stored captures",
            Self::ReplayOne => "Replay one stored capture",
            Self::Import => "Import captures",
            Self::WipeAndReboot => "Wipe capture flash and reboot to USB boot",
            Self::TogglePerformance => "Toggle performance mode",
        }
    }

    /// Whether the operator must confirm before the command runs
    pub fn needs_confirmation(self) -> bool {
        matches!(
            self,
            Self::EraseCaptures | Self::Import | Self::WipeAndReboot
        )
    }
}

/// `y` or `Y` confirms; everything else declines
pub fn is_confirmation(key: u8) -> bool {
    matches!(key, b'y' | b'Y')
}

/// Result of feeding a key to a [`LineInput`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LineEvent {
    /// Character accepted (echo it)
    Echo(u8),
    /// Last character removed
    Erased,
    /// Enter pressed
    Submit,
    /// Ignored (buffer full or non-printable)
    Ignored,
}

/// Minimal line editor for short numeric entries
#[derive(Debug, Clone, Default)]
pub struct LineInput<const N: usize> {
    line: String<N>,
}

impl<const N: usize> LineInput<N> {
    pub const fn new() -> Self {
        Self {
            line: String::new(),
        }
    }

    pub fn feed(&mut self, key: u8) -> LineEvent {
        match key {
            b'\r' | b'\n' => LineEvent::Submit,
            0x08 | 0x7F => {
                if self.line.pop().is_some() {
                    LineEvent::Erased
                } else {
                    LineEvent::Ignored
                }
            }
            0x20..=0x7E => match self.line.push(key as char) {
                Ok(()) => LineEvent::Echo(key),
                Err(()) => LineEvent::Ignored,
            },
            _ => LineEvent::Ignored,
        }
    }

    pub fn as_str(&self) -> &str {
        self.line.as_str()
    }

    /// Parse the line as a decimal index
    pub fn parse_index(&self) -> Option<u32> {
        self.line.trim().parse().ok()
    }

    pub fn clear(&mut self) {
        self.line.clear();
    }
}
