use crate::error::{EarshotError, Result};

/// Output channel layout requested from the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputChannels {
    Mono = 1,
    #[default]
    Stereo = 2,
}

impl OutputChannels {
    pub fn count(self) -> u16 {
        self as u16
    }
}

/// Sample format requested from the device.
///
/// `*SYS` variants use the host byte order. `Default` lets the backend pick
/// (16-bit signed, host order).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SampleFormat {
    U8,
    S8,
    U16LSB,
    S16LSB,
    U16MSB,
    S16MSB,
    U16SYS,
    S16SYS,
    #[default]
    Default,
}

impl SampleFormat {
    pub fn bits(self) -> u16 {
        match self {
            Self::U8 | Self::S8 => 8,
            _ => 16,
        }
    }

    pub fn is_signed(self) -> bool {
        !matches!(self, Self::U8 | Self::U16LSB | Self::U16MSB | Self::U16SYS)
    }
}

/// Configuration descriptor for an Earshot world
#[derive(Debug, Clone)]
pub struct EarshotWorldDesc {
    /// Output sample rate in Hz
    pub frequency: u32,
    pub output_channels: OutputChannels,
    /// Frames per device buffer
    pub chunk_size: usize,
    pub format: SampleFormat,
    /// Number of effect channels allocated at open
    pub effect_channels: u32,
}

impl Default for EarshotWorldDesc {
    fn default() -> Self {
        Self {
            frequency: 22050,
            output_channels: OutputChannels::Stereo,
            chunk_size: 8192,
            format: SampleFormat::Default,
            effect_channels: 16,
        }
    }
}

impl EarshotWorldDesc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn output_channels(mut self, channels: OutputChannels) -> Self {
        self.output_channels = channels;
        self
    }

    pub fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    pub fn format(mut self, format: SampleFormat) -> Self {
        self.format = format;
        self
    }

    pub fn effect_channels(mut self, channels: u32) -> Self {
        self.effect_channels = channels;
        self
    }

    /// Checks the values a backend cannot work with.
    ///
    /// # Errors
    ///
    /// Returns `EarshotError::Configuration` for a zero frequency or chunk size.
    pub fn validate(&self) -> Result<()> {
        if self.frequency == 0 {
            return Err(EarshotError::Configuration(
                "Frequency must be greater than 0".to_string(),
            ));
        }
        if self.chunk_size == 0 {
            return Err(EarshotError::Configuration(
                "Chunk size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
