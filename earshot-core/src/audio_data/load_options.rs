/// Channel handling applied right after decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvertToMono {
    /// Keep whatever layout the file has
    #[default]
    Original,
    /// Average every channel down to one
    ForceMono,
}

/// How a file is turned into [`AudioData`](super::AudioData).
///
/// ```no_run
/// # use earshot_core::audio_data::{AudioData, LoadOptions};
/// // Ready to hand to a 44.1 kHz stereo mixer.
/// let options = LoadOptions::new().conform_to(44_100, 2);
/// let data = AudioData::from_path_with_options("door.ogg", &options)?;
/// # Ok::<(), earshot_core::EarshotError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub convert_to_mono: ConvertToMono,
    /// Sample rate and channel count to convert to, after the mono step
    pub target_layout: Option<(u32, u16)>,
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn convert_to_mono(mut self, convert: ConvertToMono) -> Self {
        self.convert_to_mono = convert;
        self
    }

    pub fn conform_to(mut self, sample_rate: u32, channels: u16) -> Self {
        self.target_layout = Some((sample_rate, channels));
        self
    }
}
