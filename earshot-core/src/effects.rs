//! Built-in per-channel effects.

use crate::backend::ChannelEffect;

/// Effects that can be attached to a playing sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// A single 300 ms echo at half amplitude.
    Echo,
}

impl Effect {
    /// Builds the processor for an output running at `sample_rate` with
    /// `channels` interleaved channels.
    pub fn instantiate(self, sample_rate: u32, channels: u16) -> Box<dyn ChannelEffect> {
        match self {
            Self::Echo => Box::new(EchoEffect::new(
                ECHO_DELAY_MS,
                ECHO_DECAY,
                sample_rate,
                channels,
            )),
        }
    }
}

const ECHO_DELAY_MS: u32 = 300;
const ECHO_DECAY: f32 = 0.5;

/// Feed-forward echo over a ring buffer, so the tail carries across buffers.
#[derive(Debug)]
pub struct EchoEffect {
    delay_line: Vec<f32>,
    cursor: usize,
    decay: f32,
}

impl EchoEffect {
    pub fn new(delay_ms: u32, decay: f32, sample_rate: u32, channels: u16) -> Self {
        let delay_frames = (sample_rate as u64 * delay_ms as u64 / 1000).max(1) as usize;
        Self {
            delay_line: vec![0.0; delay_frames * channels.max(1) as usize],
            cursor: 0,
            decay,
        }
    }

    /// Delay in samples (frames times channels).
    pub fn delay_samples(&self) -> usize {
        self.delay_line.len()
    }
}

impl ChannelEffect for EchoEffect {
    fn process(&mut self, frames: &mut [f32], _channels: u16) {
        let len = self.delay_line.len();
        for sample in frames.iter_mut() {
            let dry = *sample;
            *sample = dry + self.delay_line[self.cursor] * self.decay;
            self.delay_line[self.cursor] = dry;
            self.cursor = (self.cursor + 1) % len;
        }
    }
}
