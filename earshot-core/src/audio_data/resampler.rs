use crate::error::{EarshotError, Result};
use rubato::{FftFixedIn, Resampler};

/// Offline sample-rate converter for whole decoded assets.
pub struct AudioResampler {
    source_sample_rate: u32,
    target_sample_rate: u32,
    channels: u16,
    chunk_size: usize,
}

impl AudioResampler {
    /// Creates a resampler.
    ///
    /// # Arguments
    /// * `source_sample_rate` - The sample rate of the input audio
    /// * `target_sample_rate` - The desired sample rate of the output audio
    /// * `channels` - Number of channels in the audio data
    /// * `chunk_size` - Optional size of processing chunks (defaults to 1024)
    pub fn new(
        source_sample_rate: u32,
        target_sample_rate: u32,
        channels: u16,
        chunk_size: Option<usize>,
    ) -> Result<Self> {
        if source_sample_rate == 0 || target_sample_rate == 0 {
            return Err(EarshotError::AudioFormat(
                "Sample rates must be greater than 0".to_string(),
            ));
        }

        if channels == 0 {
            return Err(EarshotError::AudioFormat(
                "Channel count must be greater than 0".to_string(),
            ));
        }

        Ok(Self {
            source_sample_rate,
            target_sample_rate,
            channels,
            chunk_size: chunk_size.unwrap_or(1024).max(1),
        })
    }

    /// Resamples one planar channel.
    ///
    /// The last chunk is zero padded and the output trimmed back to the
    /// expected length, so the result is `len * target / source` frames.
    pub fn resample_channel(&self, channel_samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(channel_samples.to_vec());
        }

        let mut resampler = FftFixedIn::<f32>::new(
            self.source_sample_rate as usize,
            self.target_sample_rate as usize,
            self.chunk_size,
            2, // sub_chunks
            1,
        )
        .map_err(|e| EarshotError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        let mut output_buffer = Vec::new();
        let mut input_chunk = vec![0.0f32; self.chunk_size];

        for chunk in channel_samples.chunks(self.chunk_size) {
            input_chunk[..chunk.len()].copy_from_slice(chunk);
            input_chunk[chunk.len()..].fill(0.0);

            let waves_out = resampler
                .process(&[&input_chunk[..]], None)
                .map_err(|e| EarshotError::AudioLoading(format!("Resampling error: {}", e)))?;

            if let Some(first_channel) = waves_out.first() {
                output_buffer.extend_from_slice(first_channel);
            }
        }

        let expected = (channel_samples.len() as u64 * self.target_sample_rate as u64
            / self.source_sample_rate as u64) as usize;
        output_buffer.truncate(expected);
        Ok(output_buffer)
    }

    /// Resamples interleaved audio by splitting it into planar channels,
    /// resampling each, and interleaving the results again.
    pub fn resample_interleaved(&self, interleaved_samples: &[f32]) -> Result<Vec<f32>> {
        if self.source_sample_rate == self.target_sample_rate {
            return Ok(interleaved_samples.to_vec());
        }

        let channels = self.channels as usize;
        let resampled_channels = (0..channels)
            .map(|ch| {
                let planar: Vec<f32> = interleaved_samples
                    .chunks_exact(channels)
                    .map(|frame| frame[ch])
                    .collect();
                self.resample_channel(&planar)
            })
            .collect::<Result<Vec<_>>>()?;

        let new_frames = resampled_channels
            .iter()
            .map(Vec::len)
            .min()
            .unwrap_or(0);

        let mut interleaved = Vec::with_capacity(new_frames * channels);
        for frame_idx in 0..new_frames {
            for channel in &resampled_channels {
                interleaved.push(channel[frame_idx]);
            }
        }

        Ok(interleaved)
    }

    pub fn target_sample_rate(&self) -> u32 {
        self.target_sample_rate
    }

    pub fn source_sample_rate(&self) -> u32 {
        self.source_sample_rate
    }

    /// Ratio of target to source rate; above 1.0 means upsampling.
    pub fn resample_ratio(&self) -> f64 {
        self.target_sample_rate as f64 / self.source_sample_rate as f64
    }
}
