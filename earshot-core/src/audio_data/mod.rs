mod default_loader;
mod load_options;
mod loader;
mod resampler;

use crate::error::{EarshotError, Result};
pub use default_loader::DefaultAudioLoader;
pub use load_options::{ConvertToMono, LoadOptions};
pub use loader::AudioDataLoader;
pub use resampler::AudioResampler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Decoded PCM audio shared by reference counting.
///
/// Cloning is cheap: every clone points at the same sample buffer, so one
/// loaded effect can back many simultaneously playing instances.
///
/// # Data Format
/// Samples are stored **interleaved**: `[L0, R0, L1, R1, ...]` for stereo,
/// `[M0, M1, ...]` for mono.
#[derive(Debug, Clone)]
pub struct AudioData {
    inner: Arc<AudioDataInner>,
}

#[derive(Debug)]
struct AudioDataInner {
    /// Interleaved samples, `total_frames * channels` long
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
    /// Number of audio channels (1 = mono, 2 = stereo, ...)
    channels: u16,
    duration: Duration,
    total_frames: usize,
}

impl AudioData {
    /// Wraps interleaved samples. A trailing partial frame is ignored.
    pub fn from_samples(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let total_frames = samples.len() / channels as usize;
        let duration = if sample_rate > 0 {
            Duration::from_secs_f64(total_frames as f64 / sample_rate as f64)
        } else {
            Duration::ZERO
        };

        let mut samples = samples;
        samples.truncate(total_frames * channels as usize);

        Self {
            inner: Arc::new(AudioDataInner {
                samples,
                sample_rate,
                channels,
                duration,
                total_frames,
            }),
        }
    }

    /// Load audio data from a file path using the default loader.
    ///
    /// Supports the formats enabled in symphonia (WAV, FLAC, OGG/Vorbis, MP3
    /// when the feature is on, ...).
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        DefaultAudioLoader.load(path.as_ref(), &LoadOptions::default())
    }

    /// Load audio data from a file path with custom loading options.
    pub fn from_path_with_options(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Self> {
        DefaultAudioLoader.load(path.as_ref(), options)
    }

    /// Load audio data from a file path using a custom loader.
    pub fn from_path_with_loader<L: AudioDataLoader>(
        path: impl AsRef<Path>,
        loader: &L,
        options: &LoadOptions,
    ) -> Result<Self> {
        loader.load(path.as_ref(), options)
    }

    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.inner.channels
    }

    pub fn duration(&self) -> Duration {
        self.inner.duration
    }

    pub fn samples(&self) -> &[f32] {
        &self.inner.samples
    }

    pub fn total_frames(&self) -> usize {
        self.inner.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.inner.samples.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.samples.len()
    }

    /// Get samples for a specific channel (0-indexed)
    pub fn channel_samples(&self, channel: usize) -> Result<Vec<f32>> {
        if channel >= self.inner.channels as usize {
            return Err(EarshotError::AudioFormat(format!(
                "Channel {} out of range (max: {})",
                channel,
                self.inner.channels - 1
            )));
        }

        Ok(self
            .inner
            .samples
            .chunks(self.inner.channels as usize)
            .map(|frame| frame[channel])
            .collect())
    }

    /// Convert to mono by averaging all channels
    pub fn to_mono(&self) -> Self {
        if self.inner.channels == 1 {
            return self.clone();
        }

        let channels = self.inner.channels as usize;
        let mono_samples = self
            .inner
            .samples
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / channels as f32)
            .collect();

        Self::from_samples(mono_samples, self.inner.sample_rate, 1)
    }

    /// Convert to the given channel count.
    ///
    /// Mono is duplicated into every output channel, anything else is
    /// downmixed to mono first when going to one channel. Extra source
    /// channels beyond the target are dropped, missing ones repeat the last
    /// source channel.
    pub fn with_channels(&self, channels: u16) -> Result<Self> {
        if channels == 0 {
            return Err(EarshotError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }
        if channels == self.inner.channels {
            return Ok(self.clone());
        }
        if channels == 1 {
            return Ok(self.to_mono());
        }

        let src_channels = self.inner.channels as usize;
        let mut samples = Vec::with_capacity(self.inner.total_frames * channels as usize);
        for frame in self.inner.samples.chunks(src_channels) {
            for ch in 0..channels as usize {
                samples.push(frame[ch.min(src_channels - 1)]);
            }
        }

        Ok(Self::from_samples(samples, self.inner.sample_rate, channels))
    }

    /// Resample to a different sample rate using rubato, returns a new `AudioData` instance
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.inner.sample_rate {
            return Ok(self.clone());
        }

        let resampler = AudioResampler::new(
            self.inner.sample_rate,
            target_sample_rate,
            self.inner.channels,
            Some(1024),
        )?;

        let resampled_samples = resampler.resample_interleaved(&self.inner.samples)?;

        Ok(Self::from_samples(
            resampled_samples,
            target_sample_rate,
            self.inner.channels,
        ))
    }

    /// Resample and remix into an output layout in one go.
    pub fn conform(&self, sample_rate: u32, channels: u16) -> Result<Self> {
        self.with_channels(channels)?.resample(sample_rate)
    }
}
