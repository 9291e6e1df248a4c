//! Scriptable in-memory backend for tests.
//!
//! Nothing ever finishes on its own: tests decide when a channel or the music
//! bus ends via [`MockBackend::finish_channel`], [`MockBackend::finish_music`]
//! or [`MockBackend::complete_fades`]. A zero-length stop finishes at once and
//! fires the hook before returning, like a real mixer may.

use super::{
    AudioBackend, ChannelEffect, ChannelFinishedHook, EffectAsset, MAX_VOLUME, MusicAsset,
    MusicFinishedHook,
};
use crate::config::EarshotWorldDesc;
use crate::error::{EarshotError, Result};
use crate::playback::LoopMode;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
struct MockChannel {
    asset: Option<EffectAsset>,
    paused: bool,
    fading: bool,
    volume: u8,
    reversed: bool,
    position: Option<(i16, u8)>,
    effects: Vec<Box<dyn ChannelEffect>>,
}

struct MockMusic {
    asset: MusicAsset,
    paused: bool,
    fading: bool,
}

#[derive(Default)]
struct MockState {
    open: bool,
    channels: Vec<MockChannel>,
    music: Option<MockMusic>,
    music_volume: u8,
    next_asset: u64,
    music_assets: HashSet<u64>,
    effect_assets: HashSet<u64>,
    failing_paths: HashSet<PathBuf>,
    music_hook: Option<MusicFinishedHook>,
    channel_hook: Option<ChannelFinishedHook>,
}

impl MockState {
    fn end_channel(&mut self, channel: u32) -> bool {
        let Some(slot) = self.channels.get_mut(channel as usize) else {
            return false;
        };
        if slot.asset.take().is_none() {
            return false;
        }
        slot.paused = false;
        slot.fading = false;
        slot.reversed = false;
        slot.position = None;
        slot.effects.clear();
        if let Some(hook) = &self.channel_hook {
            hook(channel);
        }
        true
    }

    fn end_music(&mut self) -> bool {
        if self.music.take().is_none() {
            return false;
        }
        if let Some(hook) = &self.music_hook {
            hook();
        }
        true
    }
}

/// Cloneable handle: the world owns one clone, the test keeps another.
#[derive(Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later load of `path` fail.
    pub fn fail_loading(&self, path: impl Into<PathBuf>) {
        self.state.lock().failing_paths.insert(path.into());
    }

    /// Ends a playing channel as if it ran out of samples.
    pub fn finish_channel(&self, channel: u32) -> bool {
        self.state.lock().end_channel(channel)
    }

    pub fn finish_music(&self) -> bool {
        self.state.lock().end_music()
    }

    /// Ends everything that is fading out. Returns how many slots ended.
    pub fn complete_fades(&self) -> usize {
        let mut state = self.state.lock();
        let fading: Vec<u32> = state
            .channels
            .iter()
            .enumerate()
            .filter(|(_, c)| c.asset.is_some() && c.fading)
            .map(|(i, _)| i as u32)
            .collect();
        let mut ended = 0;
        for channel in fading {
            ended += usize::from(state.end_channel(channel));
        }
        if state.music.as_ref().is_some_and(|m| m.fading) {
            ended += usize::from(state.end_music());
        }
        ended
    }

    pub fn is_open(&self) -> bool {
        self.state.lock().open
    }

    pub fn channel_busy(&self, channel: u32) -> bool {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .is_some_and(|c| c.asset.is_some())
    }

    pub fn channel_paused(&self, channel: u32) -> bool {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .is_some_and(|c| c.paused)
    }

    pub fn channel_fading(&self, channel: u32) -> bool {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .is_some_and(|c| c.fading)
    }

    pub fn channel_position(&self, channel: u32) -> Option<(i16, u8)> {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .and_then(|c| c.position)
    }

    pub fn channel_reversed(&self, channel: u32) -> bool {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .is_some_and(|c| c.reversed)
    }

    pub fn effect_count(&self, channel: u32) -> usize {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .map_or(0, |c| c.effects.len())
    }

    pub fn music_asset(&self) -> Option<MusicAsset> {
        self.state.lock().music.as_ref().map(|m| m.asset)
    }

    pub fn music_paused(&self) -> bool {
        self.state.lock().music.as_ref().is_some_and(|m| m.paused)
    }

    pub fn music_fading(&self) -> bool {
        self.state.lock().music.as_ref().is_some_and(|m| m.fading)
    }

    pub fn loaded_asset_count(&self) -> usize {
        let state = self.state.lock();
        state.music_assets.len() + state.effect_assets.len()
    }

    pub fn hooks_installed(&self) -> bool {
        let state = self.state.lock();
        state.music_hook.is_some() && state.channel_hook.is_some()
    }

    fn load(&self, path: &Path) -> Result<u64> {
        let mut state = self.state.lock();
        if state.failing_paths.contains(path) {
            return Err(EarshotError::AudioLoading(format!(
                "cannot decode {}",
                path.display()
            )));
        }
        let id = state.next_asset;
        state.next_asset += 1;
        Ok(id)
    }
}

impl AudioBackend for MockBackend {
    fn open(&mut self, desc: &EarshotWorldDesc) -> Result<()> {
        let mut state = self.state.lock();
        state.open = true;
        state.music_volume = MAX_VOLUME;
        state.channels = (0..desc.effect_channels)
            .map(|_| MockChannel {
                volume: MAX_VOLUME,
                ..Default::default()
            })
            .collect();
        Ok(())
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        state.open = false;
        state.channels.clear();
        state.music = None;
    }

    fn driver_name(&self) -> String {
        "mock".to_string()
    }

    fn allocate_channels(&mut self, count: u32) -> u32 {
        let mut state = self.state.lock();
        for channel in count..state.channels.len() as u32 {
            state.end_channel(channel);
        }
        state.channels.resize_with(count as usize, || MockChannel {
            volume: MAX_VOLUME,
            ..Default::default()
        });
        count
    }

    fn allocated_channels(&self) -> u32 {
        self.state.lock().channels.len() as u32
    }

    fn is_music_playing(&self) -> bool {
        self.state.lock().music.is_some()
    }

    fn load_music(&mut self, path: &Path) -> Result<MusicAsset> {
        let id = self.load(path)?;
        self.state.lock().music_assets.insert(id);
        Ok(MusicAsset(id))
    }

    fn load_effect(&mut self, path: &Path) -> Result<EffectAsset> {
        let id = self.load(path)?;
        self.state.lock().effect_assets.insert(id);
        Ok(EffectAsset(id))
    }

    fn free_music(&mut self, asset: MusicAsset) {
        self.state.lock().music_assets.remove(&asset.0);
    }

    fn free_effect(&mut self, asset: EffectAsset) {
        self.state.lock().effect_assets.remove(&asset.0);
    }

    fn play_music(
        &mut self,
        asset: MusicAsset,
        _loops: LoopMode,
        _fade_in: Duration,
    ) -> Result<()> {
        let mut state = self.state.lock();
        if !state.music_assets.contains(&asset.0) {
            return Err(EarshotError::Backend(format!("unknown music {}", asset.0)));
        }
        state.music = Some(MockMusic {
            asset,
            paused: false,
            fading: false,
        });
        Ok(())
    }

    fn play_effect(
        &mut self,
        asset: EffectAsset,
        _loops: LoopMode,
        _fade_in: Duration,
    ) -> Option<u32> {
        let mut state = self.state.lock();
        if !state.effect_assets.contains(&asset.0) {
            return None;
        }
        let (index, channel) = state
            .channels
            .iter_mut()
            .enumerate()
            .find(|(_, c)| c.asset.is_none())?;
        *channel = MockChannel {
            asset: Some(asset),
            volume: MAX_VOLUME,
            ..Default::default()
        };
        Some(index as u32)
    }

    fn pause_music(&mut self) {
        if let Some(music) = self.state.lock().music.as_mut() {
            music.paused = true;
        }
    }

    fn resume_music(&mut self) {
        if let Some(music) = self.state.lock().music.as_mut() {
            music.paused = false;
        }
    }

    fn stop_music(&mut self, fade_out: Duration) {
        let mut state = self.state.lock();
        if fade_out.is_zero() {
            state.end_music();
        } else if let Some(music) = state.music.as_mut() {
            music.fading = true;
        }
    }

    fn pause_channel(&mut self, channel: u32) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.paused = c.asset.is_some();
        }
    }

    fn resume_channel(&mut self, channel: u32) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.paused = false;
        }
    }

    fn stop_channel(&mut self, channel: u32, fade_out: Duration) {
        let mut state = self.state.lock();
        if fade_out.is_zero() {
            state.end_channel(channel);
        } else if let Some(c) = state.channels.get_mut(channel as usize) {
            c.fading = c.asset.is_some();
        }
    }

    fn music_volume(&self) -> u8 {
        self.state.lock().music_volume
    }

    fn set_music_volume(&mut self, volume: u8) {
        self.state.lock().music_volume = volume.min(MAX_VOLUME);
    }

    fn channel_volume(&self, channel: u32) -> u8 {
        self.state
            .lock()
            .channels
            .get(channel as usize)
            .map_or(0, |c| c.volume)
    }

    fn set_channel_volume(&mut self, channel: u32, volume: u8) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.volume = volume.min(MAX_VOLUME);
        }
    }

    fn set_reverse_stereo(&mut self, channel: u32, reverse: bool) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.reversed = reverse;
        }
    }

    fn set_position(&mut self, channel: u32, bearing: i16, attenuation: u8) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.position = Some((bearing, attenuation));
        }
    }

    fn register_effect(&mut self, channel: u32, effect: Box<dyn ChannelEffect>) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.effects.push(effect);
        }
    }

    fn clear_effects(&mut self, channel: u32) {
        if let Some(c) = self.state.lock().channels.get_mut(channel as usize) {
            c.effects.clear();
        }
    }

    fn set_music_finished_hook(&mut self, hook: Option<MusicFinishedHook>) {
        self.state.lock().music_hook = hook;
    }

    fn set_channel_finished_hook(&mut self, hook: Option<ChannelFinishedHook>) {
        self.state.lock().channel_hook = hook;
    }
}
