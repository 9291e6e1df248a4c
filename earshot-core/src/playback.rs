//! Playback control and state management.
//!
//! This module provides the types shared between the world and the backends:
//! - [`LoopMode`]: how many times a sound repeats
//! - [`PlaybackSlot`]: the music bus or one effect channel
//! - [`PlayState`]: playing, paused or stopped
//! - [`PlaybackInstance`]: a cursor over decoded audio with loop and fade
//!   handling, used by the software mixer

use crate::audio_data::AudioData;
use std::fmt;

/// Loop mode for audio playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoopMode {
    /// Play once and stop
    #[default]
    Once,
    /// Play once, then repeat the given number of times
    Count(u32),
    /// Repeat until explicitly stopped
    Infinite,
}

impl LoopMode {
    /// Number of repeats after the first play, `None` for [`LoopMode::Infinite`].
    pub fn repeats(self) -> Option<u32> {
        match self {
            Self::Once => Some(0),
            Self::Count(n) => Some(n),
            Self::Infinite => None,
        }
    }
}

/// Where a sound is playing: the single music bus or one effect channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackSlot {
    Music,
    Effect(u32),
}

impl PlaybackSlot {
    pub fn is_music(self) -> bool {
        matches!(self, Self::Music)
    }

    /// The effect channel index, `None` for the music bus.
    pub fn channel(self) -> Option<u32> {
        match self {
            Self::Music => None,
            Self::Effect(channel) => Some(channel),
        }
    }
}

impl fmt::Display for PlaybackSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Music => write!(f, "music bus"),
            Self::Effect(channel) => write!(f, "effect channel {}", channel),
        }
    }
}

/// Represents the current playback state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayState {
    /// Audio is currently playing
    Playing,
    /// Audio is paused (retains playback position)
    Paused,
    /// Audio reached its end or was stopped; the slot can be reused
    Stopped,
}

/// Volume ramp applied on top of the instance's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Fade {
    None,
    In { total: usize, elapsed: usize },
    Out { total: usize, elapsed: usize, from: f32 },
}

impl Fade {
    fn gain(&self) -> f32 {
        match *self {
            Self::None => 1.0,
            Self::In { total, elapsed } => elapsed as f32 / total as f32,
            Self::Out {
                total,
                elapsed,
                from,
            } => from * (1.0 - elapsed as f32 / total as f32),
        }
    }

    /// Advances one frame. Returns true when a fade-out has run to silence.
    fn step(&mut self) -> bool {
        match self {
            Self::None => false,
            Self::In { total, elapsed } => {
                *elapsed += 1;
                if *elapsed >= *total {
                    *self = Self::None;
                }
                false
            }
            Self::Out { total, elapsed, .. } => {
                *elapsed += 1;
                *elapsed >= *total
            }
        }
    }
}

/// Active playback instance
#[derive(Debug)]
pub struct PlaybackInstance {
    /// Audio data in the output layout
    audio_data: AudioData,
    /// Current playback position in frames
    current_frame: usize,
    /// Remaining repeats, `None` while looping forever
    repeats_left: Option<u32>,
    fade: Fade,
    play_state: PlayState,
}

impl PlaybackInstance {
    /// Creates a playing instance. `fade_in_frames == 0` starts at full gain.
    pub fn new(audio_data: AudioData, loop_mode: LoopMode, fade_in_frames: usize) -> Self {
        let fade = if fade_in_frames > 0 {
            Fade::In {
                total: fade_in_frames,
                elapsed: 0,
            }
        } else {
            Fade::None
        };

        Self {
            audio_data,
            current_frame: 0,
            repeats_left: loop_mode.repeats(),
            fade,
            play_state: PlayState::Playing,
        }
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn current_frame(&self) -> usize {
        self.current_frame
    }

    pub fn is_finished(&self) -> bool {
        self.play_state == PlayState::Stopped
    }

    /// Pause this instance. Has no effect on a stopped instance.
    pub fn pause(&mut self) {
        if self.play_state == PlayState::Playing {
            log::debug!("Instance paused at frame {}", self.current_frame);
            self.play_state = PlayState::Paused;
        }
    }

    /// Resume playing from current position
    pub fn resume(&mut self) {
        if self.play_state == PlayState::Paused {
            log::debug!("Instance resuming from frame {}", self.current_frame);
            self.play_state = PlayState::Playing;
        }
    }

    /// Stop immediately
    pub fn stop(&mut self) {
        self.play_state = PlayState::Stopped;
    }

    /// Fade to silence over `frames` frames, then stop.
    ///
    /// A zero-length fade stops right away.
    pub fn fade_out(&mut self, frames: usize) {
        if frames == 0 {
            self.stop();
            return;
        }
        let from = self.fade.gain();
        self.fade = Fade::Out {
            total: frames,
            elapsed: 0,
            from,
        };
    }

    /// Write up to `buffer.len() / channels` frames into `buffer`, overwriting it.
    ///
    /// Frames that could not be produced (paused, stopped, or the end was
    /// reached) are zeroed. Returns the number of frames written.
    pub fn fill_buffer(&mut self, buffer: &mut [f32], channels: u16) -> usize {
        buffer.fill(0.0);
        if self.play_state != PlayState::Playing {
            return 0;
        }

        let channels_usize = channels as usize;
        let total_frames = self.audio_data.total_frames();
        if total_frames == 0 || self.audio_data.channels() != channels {
            self.play_state = PlayState::Stopped;
            return 0;
        }

        let audio = self.audio_data.clone();
        let samples = audio.samples();
        let frame_count = buffer.len() / channels_usize;
        let mut frames_filled = 0;

        for frame in buffer.chunks_exact_mut(channels_usize).take(frame_count) {
            if self.current_frame >= total_frames && !self.wrap_around() {
                self.play_state = PlayState::Stopped;
                break;
            }

            let gain = self.fade.gain();
            let start = self.current_frame * channels_usize;
            for (out, sample) in frame
                .iter_mut()
                .zip(&samples[start..start + channels_usize])
            {
                *out = sample * gain;
            }

            self.current_frame += 1;
            frames_filled += 1;

            if self.fade.step() {
                self.play_state = PlayState::Stopped;
                break;
            }
        }

        // Finishing exactly on the last frame still counts as the end.
        if self.play_state == PlayState::Playing
            && self.current_frame >= total_frames
            && self.repeats_left == Some(0)
        {
            self.play_state = PlayState::Stopped;
        }

        frames_filled
    }

    /// Rewinds for the next repeat. Returns false when no repeats are left.
    fn wrap_around(&mut self) -> bool {
        match self.repeats_left {
            Some(0) => false,
            Some(n) => {
                self.repeats_left = Some(n - 1);
                self.current_frame = 0;
                true
            }
            None => {
                self.current_frame = 0;
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(frames: usize) -> AudioData {
        let samples: Vec<f32> = (0..frames).map(|i| (i + 1) as f32).collect();
        AudioData::from_samples(samples, 48000, 1)
    }

    #[test]
    fn loop_mode_repeats() {
        assert_eq!(LoopMode::Once.repeats(), Some(0));
        assert_eq!(LoopMode::Count(3).repeats(), Some(3));
        assert_eq!(LoopMode::Infinite.repeats(), None);
        assert_eq!(LoopMode::default(), LoopMode::Once);
    }

    #[test]
    fn slot_accessors() {
        assert!(PlaybackSlot::Music.is_music());
        assert_eq!(PlaybackSlot::Music.channel(), None);
        assert_eq!(PlaybackSlot::Effect(4).channel(), Some(4));
        assert_eq!(PlaybackSlot::Effect(4).to_string(), "effect channel 4");
    }

    #[test]
    fn plays_once_then_stops() {
        let mut instance = PlaybackInstance::new(ramp(3), LoopMode::Once, 0);
        let mut buffer = [0.0f32; 5];
        let filled = instance.fill_buffer(&mut buffer, 1);
        assert_eq!(filled, 3);
        assert_eq!(buffer, [1.0, 2.0, 3.0, 0.0, 0.0]);
        assert!(instance.is_finished());
    }

    #[test]
    fn stops_when_end_lands_on_buffer_boundary() {
        let mut instance = PlaybackInstance::new(ramp(4), LoopMode::Once, 0);
        let mut buffer = [0.0f32; 4];
        assert_eq!(instance.fill_buffer(&mut buffer, 1), 4);
        assert!(instance.is_finished());
    }

    #[test]
    fn counted_loops_repeat_the_original() {
        let mut instance = PlaybackInstance::new(ramp(2), LoopMode::Count(2), 0);
        let mut buffer = [0.0f32; 8];
        let filled = instance.fill_buffer(&mut buffer, 1);
        assert_eq!(filled, 6);
        assert_eq!(&buffer[..6], &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        assert!(instance.is_finished());
    }

    #[test]
    fn infinite_loop_never_finishes_on_its_own() {
        let mut instance = PlaybackInstance::new(ramp(3), LoopMode::Infinite, 0);
        let mut buffer = [0.0f32; 64];
        for _ in 0..10 {
            assert_eq!(instance.fill_buffer(&mut buffer, 1), 64);
        }
        assert!(!instance.is_finished());
    }

    #[test]
    fn wraps_inside_a_buffer_and_across_calls() {
        let mut instance = PlaybackInstance::new(ramp(3), LoopMode::Infinite, 0);
        let mut buffer = [0.0f32; 4];
        assert_eq!(instance.fill_buffer(&mut buffer, 1), 4);
        assert_eq!(buffer, [1.0, 2.0, 3.0, 1.0]);
        assert_eq!(instance.fill_buffer(&mut buffer, 1), 4);
        assert_eq!(buffer, [2.0, 3.0, 1.0, 2.0]);
        assert_eq!(instance.current_frame(), 2);
    }

    #[test]
    fn paused_instance_outputs_silence() {
        let mut instance = PlaybackInstance::new(ramp(8), LoopMode::Once, 0);
        instance.pause();
        let mut buffer = [9.0f32; 4];
        assert_eq!(instance.fill_buffer(&mut buffer, 1), 0);
        assert_eq!(buffer, [0.0; 4]);
        instance.resume();
        assert_eq!(instance.fill_buffer(&mut buffer, 1), 4);
        assert_eq!(instance.current_frame(), 4);
    }

    #[test]
    fn fade_in_ramps_from_silence() {
        let data = AudioData::from_samples(vec![1.0; 8], 48000, 1);
        let mut instance = PlaybackInstance::new(data, LoopMode::Once, 4);
        let mut buffer = [0.0f32; 6];
        instance.fill_buffer(&mut buffer, 1);
        assert_eq!(buffer, [0.0, 0.25, 0.5, 0.75, 1.0, 1.0]);
    }

    #[test]
    fn fade_out_stops_after_the_ramp() {
        let data = AudioData::from_samples(vec![1.0; 100], 48000, 1);
        let mut instance = PlaybackInstance::new(data, LoopMode::Infinite, 0);
        instance.fade_out(4);
        let mut buffer = [0.0f32; 8];
        let filled = instance.fill_buffer(&mut buffer, 1);
        assert_eq!(filled, 4);
        assert_eq!(&buffer[..4], &[1.0, 0.75, 0.5, 0.25]);
        assert!(instance.is_finished());
    }

    #[test]
    fn zero_fade_out_stops_immediately() {
        let mut instance = PlaybackInstance::new(ramp(10), LoopMode::Infinite, 0);
        instance.fade_out(0);
        assert!(instance.is_finished());
    }

    #[test]
    fn stereo_frames_stay_interleaved() {
        let data = AudioData::from_samples(vec![0.1, -0.1, 0.2, -0.2], 48000, 2);
        let mut instance = PlaybackInstance::new(data, LoopMode::Once, 0);
        let mut buffer = [0.0f32; 6];
        assert_eq!(instance.fill_buffer(&mut buffer, 2), 2);
        assert_eq!(buffer, [0.1, -0.1, 0.2, -0.2, 0.0, 0.0]);
    }
}
