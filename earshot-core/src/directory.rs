//! Which sounds are playing, and where.

use crate::handle::{SoundHandle, SoundSourceHandle};
use crate::math::Vec3;
use crate::playback::PlaybackSlot;
use std::collections::HashMap;

/// One live playback instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActiveSound {
    pub source: SoundSourceHandle,
    pub slot: PlaybackSlot,
    /// World position; always the origin for music
    pub position: Vec3,
    /// Distance at which the sound is silent; unused for music
    pub max_distance: f32,
    /// Last volume requested for this sound
    pub volume: f32,
}

impl ActiveSound {
    pub fn new(
        source: SoundSourceHandle,
        slot: PlaybackSlot,
        position: Vec3,
        max_distance: f32,
    ) -> Self {
        Self {
            source,
            slot,
            position,
            max_distance,
            volume: 1.0,
        }
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn is_music(&self) -> bool {
        self.slot.is_music()
    }

    /// The effect channel backing this sound, `None` for music.
    pub fn channel(&self) -> Option<u32> {
        self.slot.channel()
    }
}

/// Two-way index between sound handles and playback slots.
///
/// Every slot key maps to a handle whose entry carries that same slot. A slot
/// mapping is only dropped together with the entry that owns it.
#[derive(Debug, Default)]
pub struct PlaybackDirectory {
    sounds: HashMap<SoundHandle, ActiveSound>,
    slots: HashMap<PlaybackSlot, SoundHandle>,
}

impl PlaybackDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a sound and returns the handle that held its slot before.
    ///
    /// The previous holder keeps its entry but loses the slot mapping, so a
    /// later [`remove`](Self::remove) of it leaves the new mapping alone.
    pub fn insert(&mut self, handle: SoundHandle, sound: ActiveSound) -> Option<SoundHandle> {
        let previous = self.slots.insert(sound.slot, handle);
        self.sounds.insert(handle, sound);
        previous.filter(|previous| *previous != handle)
    }

    pub fn get(&self, handle: SoundHandle) -> Option<&ActiveSound> {
        self.sounds.get(&handle)
    }

    pub fn get_mut(&mut self, handle: SoundHandle) -> Option<&mut ActiveSound> {
        self.sounds.get_mut(&handle)
    }

    pub fn contains(&self, handle: SoundHandle) -> bool {
        self.sounds.contains_key(&handle)
    }

    /// The sound currently occupying `slot`.
    pub fn sound_on(&self, slot: PlaybackSlot) -> Option<SoundHandle> {
        self.slots.get(&slot).copied()
    }

    /// Removes a sound. Its slot mapping goes too, unless another sound has
    /// taken the slot over in the meantime.
    pub fn remove(&mut self, handle: SoundHandle) -> Option<ActiveSound> {
        let sound = self.sounds.remove(&handle)?;
        if self.slots.get(&sound.slot) == Some(&handle) {
            self.slots.remove(&sound.slot);
        }
        Some(sound)
    }

    pub fn references_source(&self, source: SoundSourceHandle) -> bool {
        self.sounds.values().any(|sound| sound.source == source)
    }

    /// Every sound on an effect channel, with its channel.
    pub fn effect_sounds(&self) -> impl Iterator<Item = (SoundHandle, u32, &ActiveSound)> + '_ {
        self.sounds
            .iter()
            .filter_map(|(handle, sound)| sound.channel().map(|c| (*handle, c, sound)))
    }

    pub fn handles(&self) -> Vec<SoundHandle> {
        self.sounds.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.sounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sounds.is_empty()
    }

    pub fn clear(&mut self) {
        self.sounds.clear();
        self.slots.clear();
    }
}
