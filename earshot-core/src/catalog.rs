//! Loaded sound sources and their playback defaults.

use crate::backend::{AudioBackend, EffectAsset, MusicAsset};
use crate::config::{SourceDefaults, is_valid_distance};
use crate::directory::PlaybackDirectory;
use crate::error::{EarshotError, Result};
use crate::handle::{HandleRegistry, SoundSourceHandle};
use crate::math::Vec3;
use std::collections::HashMap;
use std::path::Path;

/// How a source is loaded and played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioType {
    /// Streams on the single music bus; not positional
    Music,
    /// Plays on an effect channel; positional
    Effect,
}

/// The backend asset behind a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceAsset {
    Music(MusicAsset),
    Effect(EffectAsset),
}

impl SourceAsset {
    pub fn audio_type(&self) -> AudioType {
        match self {
            Self::Music(_) => AudioType::Music,
            Self::Effect(_) => AudioType::Effect,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SoundSource {
    pub asset: SourceAsset,
    pub defaults: SourceDefaults,
}

impl SoundSource {
    pub fn is_music(&self) -> bool {
        matches!(self.asset, SourceAsset::Music(_))
    }
}

#[derive(Debug, Default)]
pub struct SourceCatalog {
    sources: HashMap<SoundSourceHandle, SoundSource>,
}

impl SourceCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `path` through the backend and registers it under a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns `EarshotError::AssetLoad` when the backend cannot load the file.
    /// No handle is consumed in that case.
    pub fn load(
        &mut self,
        backend: &mut dyn AudioBackend,
        registry: &mut HandleRegistry,
        path: &Path,
        kind: AudioType,
    ) -> Result<SoundSourceHandle> {
        let asset = match kind {
            AudioType::Music => backend.load_music(path).map(SourceAsset::Music),
            AudioType::Effect => backend.load_effect(path).map(SourceAsset::Effect),
        }
        .map_err(|e| EarshotError::AssetLoad {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let handle = registry.next_source();
        self.sources.insert(
            handle,
            SoundSource {
                asset,
                defaults: SourceDefaults::default(),
            },
        );
        log::debug!("Loaded {:?} source {} from {}", kind, handle, path.display());
        Ok(handle)
    }

    /// Releases a source that nothing is playing.
    ///
    /// Returns false when the handle is unknown or a sound still uses it.
    pub fn free(
        &mut self,
        backend: &mut dyn AudioBackend,
        handle: SoundSourceHandle,
        directory: &PlaybackDirectory,
    ) -> bool {
        if directory.references_source(handle) {
            log::warn!("Refusing to free {} while it is playing", handle);
            return false;
        }
        let Some(source) = self.sources.remove(&handle) else {
            return false;
        };
        release(backend, source.asset);
        log::debug!("Freed source {}", handle);
        true
    }

    /// Frees every source no active sound refers to. Returns how many went.
    pub fn free_unused(
        &mut self,
        backend: &mut dyn AudioBackend,
        directory: &PlaybackDirectory,
    ) -> usize {
        let unused: Vec<SoundSourceHandle> = self
            .sources
            .keys()
            .copied()
            .filter(|handle| !directory.references_source(*handle))
            .collect();

        for handle in &unused {
            if let Some(source) = self.sources.remove(handle) {
                release(backend, source.asset);
            }
        }
        if !unused.is_empty() {
            log::debug!("Freed {} unused source(s)", unused.len());
        }
        unused.len()
    }

    /// Releases every asset. Used when the world closes.
    pub fn free_all(&mut self, backend: &mut dyn AudioBackend) {
        for (_, source) in self.sources.drain() {
            release(backend, source.asset);
        }
    }

    pub fn get(&self, handle: SoundSourceHandle) -> Option<&SoundSource> {
        self.sources.get(&handle)
    }

    pub fn is_valid(&self, handle: SoundSourceHandle) -> bool {
        self.sources.contains_key(&handle)
    }

    pub fn is_music(&self, handle: SoundSourceHandle) -> bool {
        self.sources.get(&handle).is_some_and(SoundSource::is_music)
    }

    pub fn defaults(&self, handle: SoundSourceHandle) -> Option<SourceDefaults> {
        self.sources.get(&handle).map(|source| source.defaults)
    }

    pub fn set_default_volume(&mut self, handle: SoundSourceHandle, volume: f32) -> bool {
        self.update_defaults(handle, |defaults| {
            defaults.volume = volume.clamp(0.0, 1.0);
        })
    }

    pub fn set_default_position(&mut self, handle: SoundSourceHandle, position: Vec3) -> bool {
        self.update_defaults(handle, |defaults| defaults.position = position)
    }

    pub fn set_default_distance_range_max(
        &mut self,
        handle: SoundSourceHandle,
        max_distance: f32,
    ) -> bool {
        if !is_valid_distance(max_distance) {
            log::warn!("Ignoring max distance {} for {}", max_distance, handle);
            return false;
        }
        self.update_defaults(handle, |defaults| defaults.max_distance = max_distance)
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    fn update_defaults(
        &mut self,
        handle: SoundSourceHandle,
        update: impl FnOnce(&mut SourceDefaults),
    ) -> bool {
        match self.sources.get_mut(&handle) {
            Some(source) => {
                update(&mut source.defaults);
                true
            }
            None => false,
        }
    }
}

fn release(backend: &mut dyn AudioBackend, asset: SourceAsset) {
    match asset {
        SourceAsset::Music(music) => backend.free_music(music),
        SourceAsset::Effect(effect) => backend.free_effect(effect),
    }
}
