//! The audio backend contract.
//!
//! The world never decodes or mixes anything itself. It drives an
//! [`AudioBackend`], which owns the output device, the decoded assets, one
//! music bus and a pool of effect channels.
//!
//! Finish hooks are the one path by which the backend talks back. They may run
//! on any thread (the audio callback, or synchronously inside a `stop_*` call)
//! and must never call back into the backend.

#[cfg(test)]
pub(crate) mod mock;
mod software;

pub use software::{MixerHandle, SoftwareBackend};

use crate::config::EarshotWorldDesc;
use crate::error::Result;
use crate::playback::LoopMode;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Top of the backend's integer volume scale.
pub const MAX_VOLUME: u8 = 128;

/// Backend id of a loaded music track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MusicAsset(pub u64);

/// Backend id of a loaded sound effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EffectAsset(pub u64);

/// Called when the music bus stops on its own or after a stop.
pub type MusicFinishedHook = Arc<dyn Fn() + Send + Sync>;

/// Called with the channel index when an effect channel stops.
pub type ChannelFinishedHook = Arc<dyn Fn(u32) + Send + Sync>;

/// A raw sample processor attached to one effect channel.
///
/// `frames` is interleaved with `channels` samples per frame and already
/// carries the channel's volume and position.
pub trait ChannelEffect: Send {
    fn process(&mut self, frames: &mut [f32], channels: u16);
}

/// Everything the world needs from a mixer.
///
/// # Notification contract
///
/// - A channel's finish hook fires no later than the moment the channel can be
///   handed out again by [`play_effect`](Self::play_effect).
/// - Replacing the current track with [`play_music`](Self::play_music) does not
///   fire the music hook for the replaced track.
/// - Stopping with a zero fade must fire the hook before the call returns.
///   Music replacement relies on this to retire the old track before the new
///   one starts.
/// - Stopping or pausing something that is not playing is a no-op.
pub trait AudioBackend: Send {
    /// Opens the output device.
    ///
    /// # Errors
    ///
    /// Returns an error when no device can be opened with the given settings.
    fn open(&mut self, desc: &EarshotWorldDesc) -> Result<()>;

    /// Halts everything and releases the device. Loaded assets stay valid.
    fn close(&mut self);

    fn driver_name(&self) -> String;

    /// Resizes the effect channel pool and returns the new count.
    ///
    /// Channels cut off by a shrink are halted and notified.
    fn allocate_channels(&mut self, count: u32) -> u32;

    fn allocated_channels(&self) -> u32;

    fn is_music_playing(&self) -> bool;

    fn load_music(&mut self, path: &Path) -> Result<MusicAsset>;
    fn load_effect(&mut self, path: &Path) -> Result<EffectAsset>;
    fn free_music(&mut self, asset: MusicAsset);
    fn free_effect(&mut self, asset: EffectAsset);

    /// Starts `asset` on the music bus, replacing whatever was playing.
    fn play_music(&mut self, asset: MusicAsset, loops: LoopMode, fade_in: Duration) -> Result<()>;

    /// Starts `asset` on a free effect channel. `None` when every channel is busy.
    fn play_effect(&mut self, asset: EffectAsset, loops: LoopMode, fade_in: Duration)
    -> Option<u32>;

    fn pause_music(&mut self);
    fn resume_music(&mut self);
    fn stop_music(&mut self, fade_out: Duration);
    fn pause_channel(&mut self, channel: u32);
    fn resume_channel(&mut self, channel: u32);
    fn stop_channel(&mut self, channel: u32, fade_out: Duration);

    /// Volume on the `0..=MAX_VOLUME` scale.
    fn music_volume(&self) -> u8;
    fn set_music_volume(&mut self, volume: u8);
    fn channel_volume(&self, channel: u32) -> u8;
    fn set_channel_volume(&mut self, channel: u32, volume: u8);

    fn set_reverse_stereo(&mut self, channel: u32, reverse: bool);

    /// Places a channel: `bearing` in degrees clockwise from straight ahead,
    /// `attenuation` from 0 (full volume) to 255 (silent).
    fn set_position(&mut self, channel: u32, bearing: i16, attenuation: u8);

    fn register_effect(&mut self, channel: u32, effect: Box<dyn ChannelEffect>);
    fn clear_effects(&mut self, channel: u32);

    fn set_music_finished_hook(&mut self, hook: Option<MusicFinishedHook>);
    fn set_channel_finished_hook(&mut self, hook: Option<ChannelFinishedHook>);
}

/// Maps a `[0, 1]` volume onto the backend scale.
pub fn volume_to_backend(volume: f32) -> u8 {
    (volume.clamp(0.0, 1.0) * MAX_VOLUME as f32) as u8
}

/// Maps a backend volume back onto `[0, 1]`. Values above [`MAX_VOLUME`]
/// saturate to 1.0.
pub fn volume_from_backend(volume: u8) -> f32 {
    volume.min(MAX_VOLUME) as f32 / MAX_VOLUME as f32
}
