use crate::backend::{AudioBackend, volume_from_backend, volume_to_backend};
use crate::catalog::{AudioType, SourceAsset, SourceCatalog};
use crate::config::{EarshotWorldDesc, SourceDefaults, is_valid_distance};
use crate::directory::{ActiveSound, PlaybackDirectory};
use crate::effects::Effect;
use crate::error::{EarshotError, Result};
use crate::events::FinishQueue;
use crate::handle::{HandleRegistry, SoundHandle, SoundSourceHandle};
use crate::math::Vec3;
use crate::playback::{LoopMode, PlaybackSlot};
use crate::spatial::{Listener, compute_pan};
use parking_lot::ReentrantMutex;
use std::cell::RefCell;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Invoked once for every sound that finishes, while its handle is still valid.
///
/// The callback receives the world and may call any of its operations.
pub type FinishCallback = Arc<dyn Fn(&EarshotWorld, SoundHandle) + Send + Sync>;

struct WorldState {
    desc: EarshotWorldDesc,
    backend: Box<dyn AudioBackend>,
    registry: HandleRegistry,
    catalog: SourceCatalog,
    directory: PlaybackDirectory,
    listener: Listener,
    finish_callback: Option<FinishCallback>,
    /// Sounds whose finish callback is running right now
    retiring: HashSet<SoundHandle>,
    /// Slots `play` calls have just claimed, with the ownerless notices seen
    /// for each while they wait to insert their sound
    awaiting: Vec<(PlaybackSlot, usize)>,
    /// Sounds retired since the world opened
    finished_total: usize,
    /// First orphan notice not yet returned by `process_events`
    orphan: Option<EarshotError>,
    open: bool,
}

impl WorldState {
    /// The slot `sound` still drives. `None` when the sound is unknown, or when
    /// it is finishing and its channel has already been handed to another sound.
    fn owned_slot(&self, sound: SoundHandle) -> Option<PlaybackSlot> {
        let slot = self.directory.get(sound)?.slot;
        (self.directory.sound_on(slot) == Some(sound)).then_some(slot)
    }

    fn apply_pan(&mut self, channel: u32, position: Vec3, max_distance: f32) {
        let pan = compute_pan(&self.listener, position, max_distance);
        self.backend
            .set_position(channel, pan.bearing, pan.attenuation);
    }

    fn refresh_pans(&mut self) {
        let targets: Vec<(u32, Vec3, f32)> = self
            .directory
            .effect_sounds()
            .filter(|(handle, channel, _)| {
                self.directory.sound_on(PlaybackSlot::Effect(*channel)) == Some(*handle)
            })
            .map(|(_, channel, sound)| (channel, sound.position, sound.max_distance))
            .collect();

        for (channel, position, max_distance) in targets {
            self.apply_pan(channel, position, max_distance);
        }
    }

    fn close(&mut self, queue: &FinishQueue) {
        if !self.open {
            return;
        }
        self.open = false;

        self.backend.set_music_finished_hook(None);
        self.backend.set_channel_finished_hook(None);
        self.backend.close();
        self.catalog.free_all(self.backend.as_mut());

        let dropped = queue.discard();
        log::info!(
            "Earshot world closed ({} active sound(s) and {} pending notice(s) dropped)",
            self.directory.len(),
            dropped
        );
        self.directory.clear();
        self.retiring.clear();
        self.awaiting.clear();
        self.orphan = None;
    }
}

/// Main world object that tracks loaded sources, playing sounds and the listener.
///
/// `EarshotWorld` is the central API. It owns an [`AudioBackend`] and turns
/// opaque handles into backend commands: it knows which effect channel (or the
/// music bus) backs each playing sound, keeps per-sound positions, and re-pans
/// every effect channel when the listener moves.
///
/// # Threading
///
/// Every operation takes `&self` and runs under one re-entrant lock, so the
/// world can be shared between threads. Backends report finished channels
/// through a queue; the world drains it at the start of each operation and in
/// [`process_events`](Self::process_events). Call that once per frame so
/// finish callbacks fire promptly.
pub struct EarshotWorld {
    state: ReentrantMutex<RefCell<WorldState>>,
    queue: FinishQueue,
}

impl EarshotWorld {
    /// Opens the backend and creates a world around it.
    ///
    /// # Errors
    ///
    /// Returns `EarshotError::Configuration` for an unusable descriptor and
    /// `EarshotError::Initialization` when the backend cannot open its device.
    pub fn init<B: AudioBackend + 'static>(desc: EarshotWorldDesc, backend: B) -> Result<Self> {
        Self::init_boxed(desc, Box::new(backend))
    }

    /// Like [`init`](Self::init), for a backend chosen at runtime.
    pub fn init_boxed(desc: EarshotWorldDesc, mut backend: Box<dyn AudioBackend>) -> Result<Self> {
        desc.validate()?;
        backend
            .open(&desc)
            .map_err(|e| EarshotError::Initialization(e.to_string()))?;

        let queue = FinishQueue::new();
        backend.set_music_finished_hook(Some(queue.music_hook()));
        backend.set_channel_finished_hook(Some(queue.channel_hook()));

        log::info!(
            "Earshot world initialized: driver {}, {} Hz, {} output(s), {} effect channel(s)",
            backend.driver_name(),
            desc.frequency,
            desc.output_channels.count(),
            backend.allocated_channels()
        );

        Ok(Self {
            state: ReentrantMutex::new(RefCell::new(WorldState {
                desc,
                backend,
                registry: HandleRegistry::new(),
                catalog: SourceCatalog::new(),
                directory: PlaybackDirectory::new(),
                listener: Listener::default(),
                finish_callback: None,
                retiring: HashSet::new(),
                awaiting: Vec::new(),
                finished_total: 0,
                orphan: None,
                open: true,
            })),
            queue,
        })
    }

    /// Stops everything, frees every source and closes the backend.
    ///
    /// Sounds still playing are dropped without a finish callback. Dropping
    /// the world does the same.
    pub fn shutdown(self) {
        self.close();
    }

    fn close(&self) {
        let guard = self.state.lock();
        if let Ok(mut state) = guard.try_borrow_mut() {
            state.close(&self.queue);
        }
    }

    /// Returns the descriptor the world was opened with.
    pub fn config(&self) -> EarshotWorldDesc {
        self.with_state(|state| state.desc.clone())
    }

    pub fn driver_name(&self) -> String {
        self.with_state(|state| state.backend.driver_name())
    }

    pub fn is_playing_music(&self) -> bool {
        self.with_state(|state| state.backend.is_music_playing())
    }

    pub fn effect_channel_count(&self) -> u32 {
        self.with_state(|state| state.backend.allocated_channels())
    }

    /// Makes sure at least `count` effect channels exist. Never shrinks the pool.
    ///
    /// # Returns
    ///
    /// The channel count after the call.
    pub fn allocate_effect_channels(&self, count: u32) -> u32 {
        self.with_state(|state| {
            let current = state.backend.allocated_channels();
            if current >= count {
                return current;
            }
            let allocated = state.backend.allocate_channels(count);
            log::info!("Effect channels grown from {} to {}", current, allocated);
            allocated
        })
    }

    // ---- sources ----

    /// Loads an audio file as music or as a positional effect.
    ///
    /// # Arguments
    ///
    /// * `path` - File to decode
    /// * `kind` - Whether it plays on the music bus or on effect channels
    ///
    /// # Errors
    ///
    /// Returns `EarshotError::AssetLoad` when the backend cannot load the file.
    pub fn load_source(
        &self,
        path: impl AsRef<Path>,
        kind: AudioType,
    ) -> Result<SoundSourceHandle> {
        self.with_state(|state| {
            state.catalog.load(
                state.backend.as_mut(),
                &mut state.registry,
                path.as_ref(),
                kind,
            )
        })
    }

    /// Frees a source. Returns false when the handle is unknown or the source
    /// is still playing.
    pub fn free_source(&self, source: SoundSourceHandle) -> bool {
        self.with_state(|state| {
            state
                .catalog
                .free(state.backend.as_mut(), source, &state.directory)
        })
    }

    /// Frees every source that is not playing and returns how many were freed.
    pub fn free_unused_sources(&self) -> usize {
        self.with_state(|state| {
            state
                .catalog
                .free_unused(state.backend.as_mut(), &state.directory)
        })
    }

    /// True while at least one sound of `source` is active.
    pub fn is_playing(&self, source: SoundSourceHandle) -> bool {
        self.with_state(|state| state.directory.references_source(source))
    }

    pub fn source_is_music(&self, source: SoundSourceHandle) -> bool {
        self.with_state(|state| state.catalog.is_music(source))
    }

    pub fn is_source_valid(&self, source: SoundSourceHandle) -> bool {
        self.with_state(|state| state.catalog.is_valid(source))
    }

    pub fn source_defaults(&self, source: SoundSourceHandle) -> Option<SourceDefaults> {
        self.with_state(|state| state.catalog.defaults(source))
    }

    /// Sets the volume new sounds of `source` start with, clamped to [0, 1].
    pub fn set_default_volume(&self, source: SoundSourceHandle, volume: f32) -> bool {
        self.with_state(|state| state.catalog.set_default_volume(source, volume))
    }

    pub fn set_default_position(&self, source: SoundSourceHandle, position: Vec3) -> bool {
        self.with_state(|state| state.catalog.set_default_position(source, position))
    }

    /// Rejects distances that are not finite and positive.
    pub fn set_default_distance_range_max(
        &self,
        source: SoundSourceHandle,
        max_distance: f32,
    ) -> bool {
        self.with_state(|state| {
            state
                .catalog
                .set_default_distance_range_max(source, max_distance)
        })
    }

    // ---- sounds ----

    /// Starts a new sound of `source`.
    ///
    /// Music replaces whatever played on the music bus; the replaced sound
    /// finishes (its callback runs) before this returns. Effects take a free
    /// effect channel and start at the source's default volume, position and
    /// distance range.
    ///
    /// # Arguments
    ///
    /// * `source` - Loaded source to play
    /// * `loops` - How often to repeat
    /// * `fade_in` - Ramp from silence over this long, zero to start at full volume
    ///
    /// # Errors
    ///
    /// - `EarshotError::InvalidSource` if `source` is not loaded
    /// - `EarshotError::NoChannelAvailable` if every effect channel is busy
    /// - any error the backend reports while starting music
    pub fn play(
        &self,
        source: SoundSourceHandle,
        loops: LoopMode,
        fade_in: Duration,
    ) -> Result<SoundHandle> {
        let guard = self.state.lock();
        let cell: &RefCell<WorldState> = &guard;
        self.settle(cell);

        let sound_source = cell.borrow().catalog.get(source).copied();
        let sound_source = sound_source.ok_or(EarshotError::InvalidSource(source))?;
        let defaults = sound_source.defaults;

        if let SourceAsset::Music(_) = sound_source.asset {
            self.end_current_music(cell);
        }

        let slot = {
            let mut state = cell.borrow_mut();
            match sound_source.asset {
                SourceAsset::Music(asset) => {
                    state
                        .backend
                        .set_music_volume(volume_to_backend(defaults.volume));
                    state.backend.play_music(asset, loops, fade_in)?;
                    PlaybackSlot::Music
                }
                SourceAsset::Effect(asset) => {
                    let channel = state
                        .backend
                        .play_effect(asset, loops, fade_in)
                        .ok_or(EarshotError::NoChannelAvailable)?;
                    PlaybackSlot::Effect(channel)
                }
            }
        };

        // Anything the previous occupant left behind must land on it, not on
        // the sound about to take the slot.
        cell.borrow_mut().awaiting.push((slot, 0));
        self.settle(cell);
        let deferred = cell
            .borrow_mut()
            .awaiting
            .pop()
            .map_or(0, |(_, deferred)| deferred);

        let stale = {
            let state = cell.borrow();
            state
                .directory
                .sound_on(slot)
                .filter(|owner| !state.retiring.contains(owner))
        };
        if let Some(stale) = stale {
            log::warn!("{} still held {} without a finish notice", stale, slot);
            self.retire(cell, stale);
        }

        let handle = {
            let mut state = cell.borrow_mut();
            let handle = state.registry.next_sound();
            let mut sound = ActiveSound::new(source, slot, Vec3::ZERO, defaults.max_distance)
                .with_volume(defaults.volume);

            if let PlaybackSlot::Effect(channel) = slot {
                sound.position = defaults.position;
                state
                    .backend
                    .set_channel_volume(channel, volume_to_backend(defaults.volume));
                state.apply_pan(channel, defaults.position, defaults.max_distance);
            }

            state.directory.insert(handle, sound);
            log::debug!("{} started on {} from {}", handle, slot, source);
            handle
        };

        for _ in 0..deferred {
            self.queue.push(slot);
        }
        Ok(handle)
    }

    /// Stops the current music and retires its sound before a new track starts.
    /// The backend fires the music hook inside a zero-fade stop, so no late
    /// notice can reach the next track.
    fn end_current_music(&self, cell: &RefCell<WorldState>) {
        let current = {
            let state = cell.borrow();
            state
                .directory
                .sound_on(PlaybackSlot::Music)
                .filter(|owner| !state.retiring.contains(owner))
        };
        if current.is_none() {
            return;
        }

        cell.borrow_mut().backend.stop_music(Duration::ZERO);
        self.settle(cell);

        let leftover = cell.borrow().directory.sound_on(PlaybackSlot::Music);
        if let Some(leftover) = leftover.filter(|owner| Some(*owner) == current) {
            self.retire(cell, leftover);
        }
    }

    /// True while `sound` is playing, paused or fading out.
    pub fn is_valid(&self, sound: SoundHandle) -> bool {
        self.with_state(|state| state.directory.contains(sound))
    }

    /// Current volume of `sound` in [0, 1], `None` for an unknown handle.
    pub fn volume(&self, sound: SoundHandle) -> Option<f32> {
        self.with_state(|state| {
            let stored = state.directory.get(sound)?.volume;
            Some(match state.owned_slot(sound) {
                Some(PlaybackSlot::Music) => volume_from_backend(state.backend.music_volume()),
                Some(PlaybackSlot::Effect(channel)) => {
                    volume_from_backend(state.backend.channel_volume(channel))
                }
                None => stored,
            })
        })
    }

    /// World position of `sound`. Music always reports the origin.
    pub fn position(&self, sound: SoundHandle) -> Option<Vec3> {
        self.with_state(|state| state.directory.get(sound).map(|s| s.position))
    }

    /// Max audible distance of an effect sound; `None` for music or unknown handles.
    pub fn distance_range_max(&self, sound: SoundHandle) -> Option<f32> {
        self.with_state(|state| {
            state
                .directory
                .get(sound)
                .filter(|s| !s.is_music())
                .map(|s| s.max_distance)
        })
    }

    pub fn active_sound_count(&self) -> usize {
        self.with_state(|state| state.directory.len())
    }

    /// Pauses `sound`. Pausing twice is harmless. False only for unknown handles.
    pub fn pause(&self, sound: SoundHandle) -> bool {
        self.with_backend_slot(sound, |state, slot| match slot {
            PlaybackSlot::Music => state.backend.pause_music(),
            PlaybackSlot::Effect(channel) => state.backend.pause_channel(channel),
        })
    }

    /// Resumes a paused `sound`. False only for unknown handles.
    pub fn resume(&self, sound: SoundHandle) -> bool {
        self.with_backend_slot(sound, |state, slot| match slot {
            PlaybackSlot::Music => state.backend.resume_music(),
            PlaybackSlot::Effect(channel) => state.backend.resume_channel(channel),
        })
    }

    /// Fades `sound` out over `fade_out`, then stops it.
    ///
    /// The handle stays valid until the backend reports the end; the finish
    /// callback fires then.
    pub fn stop(&self, sound: SoundHandle, fade_out: Duration) -> bool {
        self.with_backend_slot(sound, |state, slot| {
            log::debug!("{} stopping over {:?}", sound, fade_out);
            match slot {
                PlaybackSlot::Music => state.backend.stop_music(fade_out),
                PlaybackSlot::Effect(channel) => state.backend.stop_channel(channel, fade_out),
            }
        })
    }

    /// Sets the volume of `sound`, clamped to [0, 1].
    pub fn set_volume(&self, sound: SoundHandle, volume: f32) -> bool {
        let volume = volume.clamp(0.0, 1.0);
        self.with_state(|state| {
            let Some(entry) = state.directory.get_mut(sound) else {
                return false;
            };
            entry.volume = volume;
            match state.owned_slot(sound) {
                Some(PlaybackSlot::Music) => {
                    state.backend.set_music_volume(volume_to_backend(volume))
                }
                Some(PlaybackSlot::Effect(channel)) => state
                    .backend
                    .set_channel_volume(channel, volume_to_backend(volume)),
                None => {}
            }
            true
        })
    }

    /// Moves an effect sound and re-pans it. False for music and unknown handles.
    pub fn set_position(&self, sound: SoundHandle, position: Vec3) -> bool {
        self.with_effect(sound, |state, channel| {
            let Some(entry) = state.directory.get_mut(sound) else {
                return false;
            };
            entry.position = position;
            let max_distance = entry.max_distance;
            if let Some(channel) = channel {
                state.apply_pan(channel, position, max_distance);
            }
            true
        })
    }

    /// Changes the distance at which an effect sound becomes silent.
    ///
    /// False for music, unknown handles, and distances that are not finite and
    /// positive.
    pub fn set_distance_range_max(&self, sound: SoundHandle, max_distance: f32) -> bool {
        if !is_valid_distance(max_distance) {
            log::warn!("Ignoring max distance {} for {}", max_distance, sound);
            return false;
        }
        self.with_effect(sound, |state, channel| {
            let Some(entry) = state.directory.get_mut(sound) else {
                return false;
            };
            entry.max_distance = max_distance;
            let position = entry.position;
            if let Some(channel) = channel {
                state.apply_pan(channel, position, max_distance);
            }
            true
        })
    }

    /// Swaps left and right on an effect sound's channel. False for music.
    pub fn reverse_stereo(&self, sound: SoundHandle, reverse: bool) -> bool {
        self.with_effect(sound, |state, channel| {
            if let Some(channel) = channel {
                state.backend.set_reverse_stereo(channel, reverse);
            }
            true
        })
    }

    /// Attaches `effect` to an effect sound's channel. False for music.
    pub fn add_effect(&self, sound: SoundHandle, effect: Effect) -> bool {
        self.with_effect(sound, |state, channel| {
            if let Some(channel) = channel {
                let processor = effect.instantiate(
                    state.desc.frequency,
                    state.desc.output_channels.count(),
                );
                state.backend.register_effect(channel, processor);
                log::debug!("{:?} added to {}", effect, sound);
            }
            true
        })
    }

    /// Removes every effect from an effect sound's channel. False for music.
    pub fn clear_effects(&self, sound: SoundHandle) -> bool {
        self.with_effect(sound, |state, channel| {
            if let Some(channel) = channel {
                state.backend.clear_effects(channel);
            }
            true
        })
    }

    // ---- listener ----

    pub fn listener_position(&self) -> Vec3 {
        self.with_state(|state| state.listener.position())
    }

    pub fn listener_forward(&self) -> Vec3 {
        self.with_state(|state| state.listener.forward())
    }

    /// Moves the listener and re-pans every effect sound.
    pub fn set_listener_position(&self, position: Vec3) {
        self.with_state(|state| {
            state.listener.set_position(position);
            state.refresh_pans();
        })
    }

    /// Turns the listener and re-pans every effect sound. A zero vector means
    /// the default direction, negative Z.
    pub fn set_listener_forward(&self, forward: Vec3) {
        self.with_state(|state| {
            state.listener.set_forward(forward);
            state.refresh_pans();
        })
    }

    // ---- finish notifications ----

    /// Installs the callback run once for every sound that finishes,
    /// replacing any previous one.
    pub fn set_finish_callback<F>(&self, callback: F)
    where
        F: Fn(&EarshotWorld, SoundHandle) + Send + Sync + 'static,
    {
        self.with_state(|state| state.finish_callback = Some(Arc::new(callback)));
    }

    pub fn clear_finish_callback(&self) {
        self.with_state(|state| state.finish_callback = None);
    }

    /// Applies every finish notice the backend has queued.
    ///
    /// # Returns
    ///
    /// The number of sounds that finished.
    ///
    /// # Errors
    ///
    /// Returns `EarshotError::OrphanChannel` when a notice named a slot no
    /// sound owns, including notices drained by other operations since the
    /// last call. The remaining notices are still applied.
    pub fn process_events(&self) -> Result<usize> {
        let guard = self.state.lock();
        let before = guard.borrow().finished_total;
        // Finish callbacks may drain part of the queue through nested calls;
        // their retirements and orphans land in the shared counters too.
        self.settle(&guard);
        let mut state = guard.borrow_mut();
        match state.orphan.take() {
            Some(err) => Err(err),
            None => Ok(state.finished_total - before),
        }
    }

    // ---- internals ----

    /// Runs `f` under the lock after applying pending finish notices.
    fn with_state<R>(&self, f: impl FnOnce(&mut WorldState) -> R) -> R {
        let guard = self.state.lock();
        self.settle(&guard);
        let mut state = guard.borrow_mut();
        f(&mut state)
    }

    /// Runs `f` with the slot `sound` drives. False for unknown handles; a
    /// finishing sound whose slot was reused reports true without touching
    /// the backend.
    fn with_backend_slot(
        &self,
        sound: SoundHandle,
        f: impl FnOnce(&mut WorldState, PlaybackSlot),
    ) -> bool {
        self.with_state(|state| {
            if !state.directory.contains(sound) {
                return false;
            }
            if let Some(slot) = state.owned_slot(sound) {
                f(state, slot);
            }
            true
        })
    }

    /// Runs `f` for an effect sound, with its channel when it still owns one.
    fn with_effect(
        &self,
        sound: SoundHandle,
        f: impl FnOnce(&mut WorldState, Option<u32>) -> bool,
    ) -> bool {
        self.with_state(|state| {
            match state.directory.get(sound) {
                None => return false,
                Some(entry) if entry.is_music() => {
                    log::warn!("{} is music; channel operations do not apply", sound);
                    return false;
                }
                Some(_) => {}
            }
            let channel = state.owned_slot(sound).and_then(PlaybackSlot::channel);
            f(state, channel)
        })
    }

    /// Drains the finish queue. Must be called with the lock held and no
    /// borrow of `cell` outstanding.
    fn settle(&self, cell: &RefCell<WorldState>) {
        while let Some(slot) = self.queue.try_next() {
            let owner = {
                let state = cell.borrow();
                if !state.open {
                    continue;
                }
                state
                    .directory
                    .sound_on(slot)
                    .filter(|owner| !state.retiring.contains(owner))
            };

            if let Some(handle) = owner {
                self.retire(cell, handle);
                continue;
            }

            let mut guard = cell.borrow_mut();
            let state = &mut *guard;
            match state.awaiting.iter_mut().find(|(s, _)| *s == slot) {
                Some((_, deferred)) => *deferred += 1,
                None => {
                    let err = EarshotError::OrphanChannel(slot);
                    log::error!("{}", err);
                    state.orphan.get_or_insert(err);
                }
            }
        }
    }

    /// Runs the finish callback for `sound`, then forgets it.
    fn retire(&self, cell: &RefCell<WorldState>, sound: SoundHandle) {
        let callback = {
            let mut state = cell.borrow_mut();
            if !state.directory.contains(sound) || !state.retiring.insert(sound) {
                return;
            }
            state.finish_callback.clone()
        };

        log::debug!("{} finished", sound);
        if let Some(callback) = callback {
            callback(self, sound);
        }

        let mut state = cell.borrow_mut();
        state.retiring.remove(&sound);
        if state.directory.remove(sound).is_some() {
            state.finished_total += 1;
        }
    }
}

impl Drop for EarshotWorld {
    fn drop(&mut self) {
        self.close();
    }
}
