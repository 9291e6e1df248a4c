//! Software mixer behind [`SoftwareBackend`](crate::backend::SoftwareBackend).
//!
//! One music voice plus a pool of effect channels. Every voice is rendered
//! into a scratch buffer, shaped by its volume, stereo position, reverse flag
//! and effect chain, then summed into the output.

use crate::backend::{ChannelEffect, MAX_VOLUME};
use crate::playback::{PlayState, PlaybackInstance, PlaybackSlot};
use crate::spatial::MAX_ATTENUATION;

/// Per-channel gains derived from a bearing and an attenuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StereoGains {
    pub left: f32,
    pub right: f32,
}

impl Default for StereoGains {
    fn default() -> Self {
        Self {
            left: 1.0,
            right: 1.0,
        }
    }
}

impl StereoGains {
    /// Constant-sum pan on the sine of the bearing: straight ahead and behind
    /// are centered, 90 is hard right, 270 hard left.
    pub fn from_position(bearing: i16, attenuation: u8) -> Self {
        let pan = (bearing as f32).to_radians().sin();
        let level = 1.0 - attenuation as f32 / MAX_ATTENUATION as f32;
        Self {
            left: (1.0 - pan).min(1.0) * level,
            right: (1.0 + pan).min(1.0) * level,
        }
    }

    fn mono(&self) -> f32 {
        (self.left + self.right) * 0.5
    }
}

struct ChannelVoice {
    instance: Option<PlaybackInstance>,
    volume: u8,
    gains: StereoGains,
    reversed: bool,
    effects: Vec<Box<dyn ChannelEffect>>,
}

impl Default for ChannelVoice {
    fn default() -> Self {
        Self {
            instance: None,
            volume: MAX_VOLUME,
            gains: StereoGains::default(),
            reversed: false,
            effects: Vec::new(),
        }
    }
}

impl ChannelVoice {
    /// Back to a blank channel; the volume survives like on a hardware mixer.
    fn reset(&mut self) {
        self.instance = None;
        self.gains = StereoGains::default();
        self.reversed = false;
        self.effects.clear();
    }
}

pub struct Mixer {
    sample_rate: u32,
    channels: u16,
    voices: Vec<ChannelVoice>,
    music: Option<PlaybackInstance>,
    music_volume: u8,
    scratch: Vec<f32>,
}

impl Mixer {
    pub fn new(sample_rate: u32, channels: u16, effect_channels: u32) -> Self {
        Self {
            sample_rate,
            channels: channels.max(1),
            voices: (0..effect_channels).map(|_| ChannelVoice::default()).collect(),
            music: None,
            music_volume: MAX_VOLUME,
            scratch: Vec::new(),
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn output_channels(&self) -> u16 {
        self.channels
    }

    pub fn channel_count(&self) -> u32 {
        self.voices.len() as u32
    }

    /// Resizes the channel pool. Returns the channels that were cut off while
    /// busy.
    pub fn resize(&mut self, count: u32) -> Vec<u32> {
        let halted = (count..self.channel_count())
            .filter(|&c| self.voices[c as usize].instance.is_some())
            .collect();
        self.voices
            .resize_with(count as usize, ChannelVoice::default);
        halted
    }

    /// Puts `instance` on the first idle channel. `None` when all are busy.
    pub fn start_channel(&mut self, instance: PlaybackInstance) -> Option<u32> {
        let (index, voice) = self
            .voices
            .iter_mut()
            .enumerate()
            .find(|(_, voice)| voice.instance.is_none())?;
        voice.reset();
        voice.volume = MAX_VOLUME;
        voice.instance = Some(instance);
        Some(index as u32)
    }

    /// Replaces the music voice.
    pub fn start_music(&mut self, instance: PlaybackInstance) {
        self.music = Some(instance);
    }

    pub fn is_music_playing(&self) -> bool {
        self.music.is_some()
    }

    pub fn is_channel_busy(&self, channel: u32) -> bool {
        self.voice(channel).is_some_and(|v| v.instance.is_some())
    }

    pub fn channel_state(&self, channel: u32) -> Option<PlayState> {
        self.voice(channel)?.instance.as_ref().map(|i| i.play_state())
    }

    pub fn music_state(&self) -> Option<PlayState> {
        self.music.as_ref().map(|i| i.play_state())
    }

    pub fn pause_music(&mut self) {
        if let Some(music) = self.music.as_mut() {
            music.pause();
        }
    }

    pub fn resume_music(&mut self) {
        if let Some(music) = self.music.as_mut() {
            music.resume();
        }
    }

    pub fn fade_out_music(&mut self, frames: usize) {
        if let Some(music) = self.music.as_mut() {
            music.fade_out(frames);
        }
    }

    pub fn pause_channel(&mut self, channel: u32) {
        if let Some(instance) = self.instance_mut(channel) {
            instance.pause();
        }
    }

    pub fn resume_channel(&mut self, channel: u32) {
        if let Some(instance) = self.instance_mut(channel) {
            instance.resume();
        }
    }

    pub fn fade_out_channel(&mut self, channel: u32, frames: usize) {
        if let Some(instance) = self.instance_mut(channel) {
            instance.fade_out(frames);
        }
    }

    pub fn music_volume(&self) -> u8 {
        self.music_volume
    }

    pub fn set_music_volume(&mut self, volume: u8) {
        self.music_volume = volume.min(MAX_VOLUME);
    }

    pub fn channel_volume(&self, channel: u32) -> u8 {
        self.voice(channel).map_or(0, |v| v.volume)
    }

    pub fn set_channel_volume(&mut self, channel: u32, volume: u8) {
        if let Some(voice) = self.voice_mut(channel) {
            voice.volume = volume.min(MAX_VOLUME);
        }
    }

    pub fn set_position(&mut self, channel: u32, bearing: i16, attenuation: u8) {
        if let Some(voice) = self.voice_mut(channel) {
            voice.gains = StereoGains::from_position(bearing, attenuation);
        }
    }

    pub fn set_reverse_stereo(&mut self, channel: u32, reverse: bool) {
        if let Some(voice) = self.voice_mut(channel) {
            voice.reversed = reverse;
        }
    }

    pub fn register_effect(&mut self, channel: u32, effect: Box<dyn ChannelEffect>) {
        if let Some(voice) = self.voice_mut(channel) {
            voice.effects.push(effect);
        }
    }

    pub fn clear_effects(&mut self, channel: u32) {
        if let Some(voice) = self.voice_mut(channel) {
            voice.effects.clear();
        }
    }

    /// Halts every voice. Returns the slots that were busy.
    pub fn halt_all(&mut self) -> Vec<PlaybackSlot> {
        for instance in self
            .voices
            .iter_mut()
            .filter_map(|v| v.instance.as_mut())
            .chain(self.music.as_mut())
        {
            instance.stop();
        }
        self.reap()
    }

    /// Frees every voice that has stopped and returns their slots.
    pub fn reap(&mut self) -> Vec<PlaybackSlot> {
        let mut finished = Vec::new();
        for (index, voice) in self.voices.iter_mut().enumerate() {
            if voice.instance.as_ref().is_some_and(|i| i.is_finished()) {
                voice.reset();
                finished.push(PlaybackSlot::Effect(index as u32));
            }
        }
        if self.music.as_ref().is_some_and(|i| i.is_finished()) {
            self.music = None;
            finished.push(PlaybackSlot::Music);
        }
        finished
    }

    /// Mixes the next `out.len() / channels` frames into `out`, overwriting it.
    ///
    /// Returns the slots that finished during this block.
    pub fn render(&mut self, out: &mut [f32]) -> Vec<PlaybackSlot> {
        out.fill(0.0);
        let channels = self.channels;
        let usable = out.len() - out.len() % channels as usize;
        let out = &mut out[..usable];
        self.scratch.resize(usable, 0.0);

        for voice in &mut self.voices {
            let Some(instance) = voice.instance.as_mut() else {
                continue;
            };
            if instance.play_state() != PlayState::Playing {
                continue;
            }

            let frames = instance.fill_buffer(&mut self.scratch, channels);
            if frames == 0 {
                continue;
            }

            let level = voice.volume as f32 / MAX_VOLUME as f32;
            shape(&mut self.scratch, channels, level, voice.gains, voice.reversed);
            for effect in &mut voice.effects {
                effect.process(&mut self.scratch, channels);
            }
            accumulate(out, &self.scratch);
        }

        if let Some(music) = self.music.as_mut() {
            if music.play_state() == PlayState::Playing
                && music.fill_buffer(&mut self.scratch, channels) > 0
            {
                let level = self.music_volume as f32 / MAX_VOLUME as f32;
                shape(&mut self.scratch, channels, level, StereoGains::default(), false);
                accumulate(out, &self.scratch);
            }
        }

        for sample in out.iter_mut() {
            *sample = sample.clamp(-1.0, 1.0);
        }

        self.reap()
    }

    fn voice(&self, channel: u32) -> Option<&ChannelVoice> {
        self.voices.get(channel as usize)
    }

    fn voice_mut(&mut self, channel: u32) -> Option<&mut ChannelVoice> {
        self.voices.get_mut(channel as usize)
    }

    fn instance_mut(&mut self, channel: u32) -> Option<&mut PlaybackInstance> {
        self.voice_mut(channel)?.instance.as_mut()
    }
}

fn shape(buffer: &mut [f32], channels: u16, level: f32, gains: StereoGains, reversed: bool) {
    if channels == 1 {
        let gain = level * gains.mono();
        for sample in buffer.iter_mut() {
            *sample *= gain;
        }
        return;
    }

    for frame in buffer.chunks_exact_mut(channels as usize) {
        if reversed {
            frame.swap(0, 1);
        }
        frame[0] *= level * gains.left;
        frame[1] *= level * gains.right;
        for sample in &mut frame[2..] {
            *sample *= level;
        }
    }
}

fn accumulate(out: &mut [f32], voice: &[f32]) {
    for (out, sample) in out.iter_mut().zip(voice) {
        *out += sample;
    }
}
