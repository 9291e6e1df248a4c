//! Finish notifications travelling from the backend to the world.

use crate::backend::{ChannelFinishedHook, MusicFinishedHook};
use crate::playback::PlaybackSlot;
use crossbeam_channel::{Receiver, Sender, unbounded};
use std::sync::Arc;

/// Unbounded queue of slots that stopped playing.
///
/// The backend side only ever pushes, from whatever thread it finishes on.
/// The world drains the queue while holding its own lock.
#[derive(Debug)]
pub struct FinishQueue {
    sender: Sender<PlaybackSlot>,
    receiver: Receiver<PlaybackSlot>,
}

impl Default for FinishQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl FinishQueue {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn music_hook(&self) -> MusicFinishedHook {
        let sender = self.sender.clone();
        Arc::new(move || {
            // The receiver lives as long as the world; a failed send means it
            // is already gone and nobody is left to notify.
            let _ = sender.send(PlaybackSlot::Music);
        })
    }

    pub fn channel_hook(&self) -> ChannelFinishedHook {
        let sender = self.sender.clone();
        Arc::new(move |channel| {
            let _ = sender.send(PlaybackSlot::Effect(channel));
        })
    }

    pub fn push(&self, slot: PlaybackSlot) {
        let _ = self.sender.send(slot);
    }

    pub fn try_next(&self) -> Option<PlaybackSlot> {
        self.receiver.try_recv().ok()
    }

    /// Drops everything queued. Returns how many notices were discarded.
    pub fn discard(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}
