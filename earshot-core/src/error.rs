//! Error types for Earshot

use crate::handle::SoundSourceHandle;
use crate::playback::PlaybackSlot;
use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by the world and by backends.
///
/// Stale or unknown sound handles are not errors: operations on them return
/// `false` or `None` instead.
#[derive(Error, Debug)]
pub enum EarshotError {
    #[error("Initialization error: {0}")]
    Initialization(String),

    #[error("Failed to load audio asset {path:?}: {reason}")]
    AssetLoad { path: PathBuf, reason: String },

    #[error("Invalid sound source: {0}")]
    InvalidSource(SoundSourceHandle),

    #[error("No effect channel available to play the sound")]
    NoChannelAvailable,

    #[error("Finish notification for untracked {0}")]
    OrphanChannel(PlaybackSlot),

    #[error("Audio backend error: {0}")]
    Backend(String),

    #[error("Audio loading error: {0}")]
    AudioLoading(String),

    #[error("Audio format error: {0}")]
    AudioFormat(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EarshotError>;
