//! # Earshot Core
//!
//! Positional audio and active-sound bookkeeping on top of a channel mixer.
//!
//! Earshot keeps track of two things for a game: the *sources* it has loaded
//! (music tracks and sound effects) and the *sounds* currently playing from
//! them. Each sound is placed in the world and heard by a single listener; its
//! position is turned into a bearing and a distance attenuation and handed to
//! the mixer channel it plays on. When a sound ends, its handle is retired and
//! an optional callback runs.
//!
//! The mixer itself sits behind the [`AudioBackend`] trait. The crate ships
//! [`SoftwareBackend`], which decodes assets with symphonia and mixes them in
//! software; with the `device` feature it plays through cpal.
//!
//! ## Quick Start
//!
//! ```no_run
//! use earshot_core::*;
//! use std::time::Duration;
//!
//! let world = EarshotWorld::init(EarshotWorldDesc::default(), SoftwareBackend::headless())?;
//!
//! let footstep = world.load_source("footstep.wav", AudioType::Effect)?;
//! world.set_default_distance_range_max(footstep, 40.0);
//!
//! world.set_finish_callback(|_, sound| println!("{} finished", sound));
//!
//! let sound = world.play(footstep, LoopMode::Once, Duration::ZERO)?;
//! world.set_position(sound, Vec3::new(5.0, 0.0, -2.0));
//!
//! // Once per frame, as the player moves:
//! world.set_listener_position(Vec3::new(1.0, 0.0, 0.0));
//! world.process_events()?;
//! # Ok::<(), EarshotError>(())
//! ```
//!
//! ## Key Components
//!
//! - **[`EarshotWorld`]**: owns the backend, the loaded sources, the playing sounds and the listener
//! - **[`AudioBackend`]**: the mixer operations the world relies on
//! - **[`SoftwareBackend`]**: the built-in backend
//! - **[`SoundSourceHandle`] / [`SoundHandle`]**: opaque ids for loaded sources and playing sounds
//! - **[`AudioData`](audio_data::AudioData)**: decoded PCM, loaded from files

pub mod audio_data;
pub mod backend;
pub mod catalog;
pub mod config;
pub mod directory;
pub mod effects;
#[cfg(feature = "device")]
pub mod engine;
pub mod error;
pub mod events;
pub mod handle;
pub mod math;
pub mod mixer;
pub mod playback;
pub mod spatial;
pub mod world;

pub use backend::{AudioBackend, MixerHandle, SoftwareBackend};
pub use catalog::AudioType;
pub use config::{EarshotWorldDesc, OutputChannels, SampleFormat, SourceDefaults};
pub use effects::Effect;
#[cfg(feature = "device")]
pub use engine::OutputStream;
pub use error::{EarshotError, Result};
pub use handle::{SoundHandle, SoundSourceHandle};
pub use math::Vec3;
pub use playback::LoopMode;
pub use spatial::Listener;
pub use world::{EarshotWorld, FinishCallback};
