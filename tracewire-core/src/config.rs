//! Runtime settings
//!
//! Defaults reproduce the bench setup the tool was built for: a PS/2 style
//! bus with data on GPIO 20 and clock on GPIO 21, sampled every 2 µs.

/// Capture window length in 32-bit words
pub const CAPTURE_WINDOW_WORDS: usize = 0xA000;

/// Capture window length in bytes
pub const CAPTURE_WINDOW_BYTES: usize = CAPTURE_WINDOW_WORDS * 4;

/// Default pre-trigger sample count
pub const DEFAULT_PRE_TRIGGER: usize = 200;

/// Default sample period in microseconds
pub const DEFAULT_SAMPLE_PERIOD_US: u32 = 2;

/// Default glitch threshold in microseconds (pulses strictly shorter are glitches)
pub const DEFAULT_GLITCH_THRESHOLD_US: u32 = 20;

/// Clock level that ends the pre-trigger phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerLevel {
    /// Clock observed high
    #[default]
    High,
    /// Clock observed low
    Low,
}

impl TriggerLevel {
    /// Check whether a clock sample satisfies the trigger
    pub fn is_met(self, clock_high: bool) -> bool {
        match self {
            TriggerLevel::High => clock_high,
            TriggerLevel::Low => !clock_high,
        }
    }
}

/// Bit positions of the bus lines inside a port snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusLayout {
    pub data_bit: u8,
    pub clock_bit: u8,
}

impl BusLayout {
    pub const fn new(data_bit: u8, clock_bit: u8) -> Self {
        Self {
            data_bit,
            clock_bit,
        }
    }

    /// Data line state in a snapshot
    pub fn data(&self, word: u32) -> bool {
        (word >> self.data_bit) & 1 != 0
    }

    /// Clock line state in a snapshot
    pub fn clock(&self, word: u32) -> bool {
        (word >> self.clock_bit) & 1 != 0
    }
}

impl Default for BusLayout {
    fn default() -> Self {
        Self::new(20, 21)
    }
}

/// Capture/replay loop settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CaptureSettings {
    /// Samples written before the trigger check (clamped to the window)
    pub pre_trigger: usize,
    /// Cycles to run; 0 runs until stopped
    pub iterations: u32,
    /// Append each capture to the store
    pub persist: bool,
    /// Sample and replay period
    pub sample_period_us: u32,
    pub trigger: TriggerLevel,
    pub layout: BusLayout,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            pre_trigger: DEFAULT_PRE_TRIGGER,
            iterations: 0,
            persist: true,
            sample_period_us: DEFAULT_SAMPLE_PERIOD_US,
            trigger: TriggerLevel::default(),
            layout: BusLayout::default(),
        }
    }
}

/// Glitch detector settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct GlitchSettings {
    pub threshold_us: u32,
}

impl Default for GlitchSettings {
    fn default() -> Self {
        Self {
            threshold_us: DEFAULT_GLITCH_THRESHOLD_US,
        }
    }
}

/// System clock profile persisted across reboots
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PerformanceMode {
    /// 125 MHz
    #[default]
    Standard,
    /// 250 MHz
    Boost,
}

impl PerformanceMode {
    /// Scratch register value marking boost mode
    pub const BOOST_MAGIC: u32 = 0x6969_6969;

    /// Decode a persisted scratch word; anything but the magic is standard
    pub fn from_scratch(word: u32) -> Self {
        if word == Self::BOOST_MAGIC {
            PerformanceMode::Boost
        } else {
            PerformanceMode::Standard
        }
    }

    pub fn to_scratch(self) -> u32 {
        match self {
            PerformanceMode::Standard => 0,
            PerformanceMode::Boost => Self::BOOST_MAGIC,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            PerformanceMode::Standard => PerformanceMode::Boost,
            PerformanceMode::Boost => PerformanceMode::Standard,
        }
    }

    pub fn sys_clock_hz(self) -> u32 {
        match self {
            PerformanceMode::Standard => 125_000_000,
            PerformanceMode::Boost => 250_000_000,
        }
    }
}
