use super::{
    AudioBackend, ChannelEffect, ChannelFinishedHook, EffectAsset, MusicAsset, MusicFinishedHook,
};
use crate::audio_data::{AudioData, LoadOptions};
use crate::config::EarshotWorldDesc;
use crate::error::{EarshotError, Result};
use crate::mixer::Mixer;
use crate::playback::{LoopMode, PlaybackInstance, PlaybackSlot};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

#[cfg(feature = "device")]
use crate::engine::OutputStream;

#[derive(Default)]
struct Shared {
    mixer: Option<Mixer>,
    music_hook: Option<MusicFinishedHook>,
    channel_hook: Option<ChannelFinishedHook>,
}

impl Shared {
    /// Reports finished slots. Runs under the mixer lock, so no slot can be
    /// handed out again before its notice is queued.
    fn notify(&self, finished: &[PlaybackSlot]) {
        for slot in finished {
            match slot {
                PlaybackSlot::Music => {
                    if let Some(hook) = &self.music_hook {
                        hook();
                    }
                }
                PlaybackSlot::Effect(channel) => {
                    if let Some(hook) = &self.channel_hook {
                        hook(*channel);
                    }
                }
            }
        }
    }

    /// Runs `f` on the mixer and reports whatever it left stopped.
    fn with_mixer<R>(&mut self, f: impl FnOnce(&mut Mixer) -> R) -> Option<R> {
        let mixer = self.mixer.as_mut()?;
        let result = f(mixer);
        let finished = mixer.reap();
        self.notify(&finished);
        Some(result)
    }
}

/// Pulls mixed audio out of a [`SoftwareBackend`].
///
/// The output stream holds one of these; without the `device` feature the
/// application drives it itself, e.g. to render offline.
#[derive(Clone)]
pub struct MixerHandle {
    shared: Arc<Mutex<Shared>>,
}

impl MixerHandle {
    /// Fills `out` with the next interleaved frames. Silence while the backend
    /// is closed. Returns the number of frames rendered.
    pub fn render(&self, out: &mut [f32]) -> usize {
        let mut shared = self.shared.lock();
        let Some(mixer) = shared.mixer.as_mut() else {
            out.fill(0.0);
            return 0;
        };
        let channels = mixer.output_channels() as usize;
        let finished = mixer.render(out);
        shared.notify(&finished);
        out.len() / channels
    }

    pub fn output_channels(&self) -> Option<u16> {
        self.shared.lock().mixer.as_ref().map(Mixer::output_channels)
    }
}

enum Output {
    Headless,
    #[cfg(feature = "device")]
    Device(Option<OutputStream>),
}

/// [`AudioBackend`] built on the crate's own decoder and mixer.
///
/// Assets are decoded with symphonia and converted to the output rate and
/// layout at load time, outside the mixer lock.
pub struct SoftwareBackend {
    shared: Arc<Mutex<Shared>>,
    output: Output,
    layout: Option<(u32, u16)>,
    music_assets: HashMap<u64, AudioData>,
    effect_assets: HashMap<u64, AudioData>,
    next_asset: u64,
}

impl SoftwareBackend {
    /// A backend nobody listens to; render it through [`renderer`](Self::renderer).
    pub fn headless() -> Self {
        Self::with_output(Output::Headless)
    }

    /// A backend playing through the default cpal output device.
    #[cfg(feature = "device")]
    pub fn with_device() -> Self {
        Self::with_output(Output::Device(None))
    }

    fn with_output(output: Output) -> Self {
        Self {
            shared: Arc::new(Mutex::new(Shared::default())),
            output,
            layout: None,
            music_assets: HashMap::new(),
            effect_assets: HashMap::new(),
            next_asset: 0,
        }
    }

    pub fn renderer(&self) -> MixerHandle {
        MixerHandle {
            shared: self.shared.clone(),
        }
    }

    fn decode(&self, path: &Path) -> Result<AudioData> {
        let (sample_rate, channels) = self
            .layout
            .ok_or_else(|| EarshotError::Backend("Backend is not open".to_string()))?;
        let options = LoadOptions::new().conform_to(sample_rate, channels);
        AudioData::from_path_with_options(path, &options)
    }

    fn frames(&self, duration: Duration) -> usize {
        let sample_rate = self.layout.map_or(0, |(rate, _)| rate);
        (duration.as_secs_f64() * sample_rate as f64).round() as usize
    }

    fn mixer<R>(&self, f: impl FnOnce(&mut Mixer) -> R) -> Option<R> {
        self.shared.lock().with_mixer(f)
    }

    fn read<R>(&self, f: impl FnOnce(&Mixer) -> R) -> Option<R> {
        self.shared.lock().mixer.as_ref().map(f)
    }
}

impl AudioBackend for SoftwareBackend {
    fn open(&mut self, desc: &EarshotWorldDesc) -> Result<()> {
        let channels = desc.output_channels.count();
        self.shared.lock().mixer = Some(Mixer::new(desc.frequency, channels, desc.effect_channels));
        self.layout = Some((desc.frequency, channels));

        #[cfg(feature = "device")]
        if let Output::Device(stream) = &mut self.output {
            match OutputStream::open(desc, self.renderer()) {
                Ok(opened) => *stream = Some(opened),
                Err(e) => {
                    self.shared.lock().mixer = None;
                    self.layout = None;
                    return Err(e);
                }
            }
        }

        log::info!(
            "Software backend opened ({} Hz, {} channel(s), {} effect channel(s), {})",
            desc.frequency,
            channels,
            desc.effect_channels,
            self.driver_name()
        );
        Ok(())
    }

    fn close(&mut self) {
        #[cfg(feature = "device")]
        if let Output::Device(stream) = &mut self.output {
            stream.take();
        }

        let mut shared = self.shared.lock();
        if let Some(mut mixer) = shared.mixer.take() {
            let halted = mixer.halt_all();
            shared.notify(&halted);
        }
        self.layout = None;
    }

    fn driver_name(&self) -> String {
        match &self.output {
            Output::Headless => "headless".to_string(),
            #[cfg(feature = "device")]
            Output::Device(stream) => stream
                .as_ref()
                .map_or_else(|| "cpal".to_string(), |s| s.host_name().to_string()),
        }
    }

    fn allocate_channels(&mut self, count: u32) -> u32 {
        let mut shared = self.shared.lock();
        let Some(mixer) = shared.mixer.as_mut() else {
            return 0;
        };
        let cut: Vec<PlaybackSlot> = mixer
            .resize(count)
            .into_iter()
            .map(PlaybackSlot::Effect)
            .collect();
        let allocated = mixer.channel_count();
        for slot in &cut {
            log::debug!("{} cut off by shrinking the pool", slot);
        }
        shared.notify(&cut);
        allocated
    }

    fn allocated_channels(&self) -> u32 {
        self.read(Mixer::channel_count).unwrap_or(0)
    }

    fn is_music_playing(&self) -> bool {
        self.read(Mixer::is_music_playing).unwrap_or(false)
    }

    fn load_music(&mut self, path: &Path) -> Result<MusicAsset> {
        let data = self.decode(path)?;
        let id = self.next_asset;
        self.next_asset += 1;
        self.music_assets.insert(id, data);
        Ok(MusicAsset(id))
    }

    fn load_effect(&mut self, path: &Path) -> Result<EffectAsset> {
        let data = self.decode(path)?;
        let id = self.next_asset;
        self.next_asset += 1;
        self.effect_assets.insert(id, data);
        Ok(EffectAsset(id))
    }

    fn free_music(&mut self, asset: MusicAsset) {
        self.music_assets.remove(&asset.0);
    }

    fn free_effect(&mut self, asset: EffectAsset) {
        self.effect_assets.remove(&asset.0);
    }

    fn play_music(&mut self, asset: MusicAsset, loops: LoopMode, fade_in: Duration) -> Result<()> {
        let data = self
            .music_assets
            .get(&asset.0)
            .cloned()
            .ok_or_else(|| EarshotError::Backend(format!("Unknown music asset {}", asset.0)))?;
        let instance = PlaybackInstance::new(data, loops, self.frames(fade_in));
        self.mixer(|mixer| mixer.start_music(instance))
            .ok_or_else(|| EarshotError::Backend("Backend is not open".to_string()))
    }

    fn play_effect(
        &mut self,
        asset: EffectAsset,
        loops: LoopMode,
        fade_in: Duration,
    ) -> Option<u32> {
        let data = self.effect_assets.get(&asset.0)?.clone();
        let instance = PlaybackInstance::new(data, loops, self.frames(fade_in));
        self.mixer(|mixer| mixer.start_channel(instance)).flatten()
    }

    fn pause_music(&mut self) {
        self.mixer(Mixer::pause_music);
    }

    fn resume_music(&mut self) {
        self.mixer(Mixer::resume_music);
    }

    fn stop_music(&mut self, fade_out: Duration) {
        let frames = self.frames(fade_out);
        self.mixer(|mixer| mixer.fade_out_music(frames));
    }

    fn pause_channel(&mut self, channel: u32) {
        self.mixer(|mixer| mixer.pause_channel(channel));
    }

    fn resume_channel(&mut self, channel: u32) {
        self.mixer(|mixer| mixer.resume_channel(channel));
    }

    fn stop_channel(&mut self, channel: u32, fade_out: Duration) {
        let frames = self.frames(fade_out);
        self.mixer(|mixer| mixer.fade_out_channel(channel, frames));
    }

    fn music_volume(&self) -> u8 {
        self.read(Mixer::music_volume).unwrap_or(0)
    }

    fn set_music_volume(&mut self, volume: u8) {
        self.mixer(|mixer| mixer.set_music_volume(volume));
    }

    fn channel_volume(&self, channel: u32) -> u8 {
        self.read(|mixer| mixer.channel_volume(channel)).unwrap_or(0)
    }

    fn set_channel_volume(&mut self, channel: u32, volume: u8) {
        self.mixer(|mixer| mixer.set_channel_volume(channel, volume));
    }

    fn set_reverse_stereo(&mut self, channel: u32, reverse: bool) {
        self.mixer(|mixer| mixer.set_reverse_stereo(channel, reverse));
    }

    fn set_position(&mut self, channel: u32, bearing: i16, attenuation: u8) {
        self.mixer(|mixer| mixer.set_position(channel, bearing, attenuation));
    }

    fn register_effect(&mut self, channel: u32, effect: Box<dyn ChannelEffect>) {
        self.mixer(|mixer| mixer.register_effect(channel, effect));
    }

    fn clear_effects(&mut self, channel: u32) {
        self.mixer(|mixer| mixer.clear_effects(channel));
    }

    fn set_music_finished_hook(&mut self, hook: Option<MusicFinishedHook>) {
        self.shared.lock().music_hook = hook;
    }

    fn set_channel_finished_hook(&mut self, hook: Option<ChannelFinishedHook>) {
        self.shared.lock().channel_hook = hook;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EarshotWorld;
    use crate::catalog::AudioType;
    use crate::config::OutputChannels;
    use crate::effects::Effect;
    use crate::math::Vec3;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    const RATE: u32 = 8000;

    fn write_tone(dir: &TempDir, name: &str, frames: usize, channels: u16) -> PathBuf {
        let path = dir.path().join(name);
        let spec = hound::WavSpec {
            channels,
            sample_rate: RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for _ in 0..frames * channels as usize {
            writer.write_sample(i16::MAX / 2).unwrap();
        }
        writer.finalize().unwrap();
        path
    }

    fn desc() -> EarshotWorldDesc {
        EarshotWorldDesc::default()
            .frequency(RATE)
            .output_channels(OutputChannels::Stereo)
            .effect_channels(2)
    }

    #[test]
    fn loading_requires_an_open_backend() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "tone.wav", 100, 1);
        let mut backend = SoftwareBackend::headless();
        assert!(backend.load_effect(&path).is_err());
        backend.open(&desc()).unwrap();
        assert!(backend.load_effect(&path).is_ok());
        assert_eq!(backend.driver_name(), "headless");
    }

    #[test]
    fn zero_fade_stops_notify_before_returning() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "theme.wav", 100, 2);
        let mut backend = SoftwareBackend::headless();
        backend.open(&desc()).unwrap();

        let music_done = Arc::new(AtomicUsize::new(0));
        let counter = music_done.clone();
        backend.set_music_finished_hook(Some(Arc::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })));
        let channels_done = Arc::new(AtomicUsize::new(0));
        let counter = channels_done.clone();
        backend.set_channel_finished_hook(Some(Arc::new(move |_: u32| {
            counter.fetch_add(1, Ordering::SeqCst);
        })));

        let music = backend.load_music(&path).unwrap();
        backend.play_music(music, LoopMode::Infinite, Duration::ZERO).unwrap();
        backend.stop_music(Duration::ZERO);
        assert_eq!(music_done.load(Ordering::SeqCst), 1);
        assert!(!backend.is_music_playing());

        let effect = backend.load_effect(&path).unwrap();
        let channel = backend
            .play_effect(effect, LoopMode::Infinite, Duration::ZERO)
            .unwrap();
        backend.stop_channel(channel, Duration::ZERO);
        assert_eq!(channels_done.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn shrinking_the_pool_notifies_cut_channels() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "hum.wav", 100, 1);
        let mut backend = SoftwareBackend::headless();
        backend.open(&desc()).unwrap();

        let cut = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let sink = cut.clone();
        backend.set_channel_finished_hook(Some(Arc::new(move |c: u32| sink.lock().push(c))));

        let asset = backend.load_effect(&path).unwrap();
        assert_eq!(backend.play_effect(asset, LoopMode::Infinite, Duration::ZERO), Some(0));
        assert_eq!(backend.play_effect(asset, LoopMode::Infinite, Duration::ZERO), Some(1));

        assert_eq!(backend.allocate_channels(1), 1);
        assert_eq!(*cut.lock(), vec![1]);
        assert_eq!(backend.allocated_channels(), 1);
    }

    #[test]
    fn effect_plays_to_the_end_and_notifies() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "blip.wav", 100, 1);

        let backend = SoftwareBackend::headless();
        let renderer = backend.renderer();
        let world = EarshotWorld::init(desc(), backend).unwrap();

        let source = world.load_source(&path, AudioType::Effect).unwrap();
        let sound = world.play(source, LoopMode::Once, Duration::ZERO).unwrap();

        let mut out = vec![0.0f32; 64 * 2];
        assert_eq!(renderer.render(&mut out), 64);
        assert!(out.iter().any(|s| *s > 0.2));
        assert!(world.is_valid(sound));

        renderer.render(&mut out);
        assert_eq!(world.process_events().unwrap(), 1);
        assert!(!world.is_valid(sound));
    }

    #[test]
    fn stop_without_fade_frees_the_channel_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "loop.wav", 100, 2);
        let world = EarshotWorld::init(desc(), SoftwareBackend::headless()).unwrap();
        let finished = Arc::new(AtomicUsize::new(0));
        let counter = finished.clone();
        world.set_finish_callback(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let source = world.load_source(&path, AudioType::Effect).unwrap();
        let a = world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();
        let b = world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();
        assert!(world.stop(a, Duration::ZERO));

        // The freed channel is reused, and the stale notice lands on `a`.
        let c = world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();
        assert!(!world.is_valid(a));
        assert!(world.is_valid(b));
        assert!(world.is_valid(c));
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn fade_out_ends_after_its_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "pad.wav", 4000, 1);
        let backend = SoftwareBackend::headless();
        let renderer = backend.renderer();
        let world = EarshotWorld::init(desc(), backend).unwrap();

        let source = world.load_source(&path, AudioType::Effect).unwrap();
        let sound = world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();
        // 10 ms at 8 kHz is 80 frames.
        world.stop(sound, Duration::from_millis(10));

        let mut out = vec![0.0f32; 40 * 2];
        renderer.render(&mut out);
        assert!(world.is_valid(sound));
        renderer.render(&mut out);
        renderer.render(&mut out);
        world.process_events().unwrap();
        assert!(!world.is_valid(sound));
    }

    #[test]
    fn music_replacement_does_not_leak_notices() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_tone(&dir, "a.wav", 2000, 2);
        let second = write_tone(&dir, "b.wav", 2000, 2);
        let backend = SoftwareBackend::headless();
        let renderer = backend.renderer();
        let world = EarshotWorld::init(desc(), backend).unwrap();

        let first = world.load_source(&first, AudioType::Music).unwrap();
        let second = world.load_source(&second, AudioType::Music).unwrap();
        let a = world.play(first, LoopMode::Infinite, Duration::ZERO).unwrap();
        let b = world.play(second, LoopMode::Once, Duration::ZERO).unwrap();
        assert!(!world.is_valid(a));
        assert!(world.is_valid(b));

        let mut out = vec![0.0f32; 256 * 2];
        for _ in 0..10 {
            renderer.render(&mut out);
        }
        assert_eq!(world.process_events().unwrap(), 1);
        assert!(!world.is_valid(b));
        assert!(!world.is_playing_music());
    }

    #[test]
    fn position_pans_the_rendered_output() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "tone.wav", 1000, 1);
        let backend = SoftwareBackend::headless();
        let renderer = backend.renderer();
        let world = EarshotWorld::init(desc(), backend).unwrap();

        let source = world.load_source(&path, AudioType::Effect).unwrap();
        world.set_default_position(source, Vec3::new(5.0, 0.0, 0.0));
        world.set_default_distance_range_max(source, 1000.0);
        world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();

        let mut out = vec![0.0f32; 16 * 2];
        renderer.render(&mut out);
        let left: f32 = out.iter().step_by(2).map(|s| s.abs()).sum();
        let right: f32 = out.iter().skip(1).step_by(2).map(|s| s.abs()).sum();
        assert!(right > 0.1);
        assert!(left < right * 0.01);
    }

    #[test]
    fn effects_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_tone(&dir, "tone.wav", 1000, 1);
        let backend = SoftwareBackend::headless();
        let renderer = backend.renderer();
        let world = EarshotWorld::init(desc(), backend).unwrap();

        let source = world.load_source(&path, AudioType::Effect).unwrap();
        let sound = world.play(source, LoopMode::Infinite, Duration::ZERO).unwrap();
        assert!(world.add_effect(sound, Effect::Echo));

        let mut out = vec![0.0f32; 32 * 2];
        assert_eq!(renderer.render(&mut out), 32);

        world.shutdown();
        assert_eq!(renderer.render(&mut out), 0);
        assert!(out.iter().all(|s| *s == 0.0));
        assert_eq!(renderer.output_channels(), None);
    }
}
