//! Device output for [`SoftwareBackend`](crate::backend::SoftwareBackend).
//!
//! A `cpal::Stream` cannot leave the thread that built it, so the stream lives
//! on a small manager thread which builds it, reports back, and then parks
//! until the [`OutputStream`] is dropped.

use crate::backend::MixerHandle;
use crate::config::EarshotWorldDesc;
use crate::error::{EarshotError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SizedSample};
use crossbeam_channel::{Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

/// A running output stream pulling from a [`MixerHandle`].
pub struct OutputStream {
    host_name: &'static str,
    frames_processed: Arc<AtomicUsize>,
    stop: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl OutputStream {
    /// Opens the default output device and starts pulling from `mixer`.
    pub fn open(desc: &EarshotWorldDesc, mixer: MixerHandle) -> Result<Self> {
        let host_name = cpal::default_host().id().name();
        let config = cpal::StreamConfig {
            channels: desc.output_channels.count(),
            sample_rate: cpal::SampleRate(desc.frequency),
            buffer_size: cpal::BufferSize::Fixed(desc.chunk_size as u32),
        };

        let frames_processed = Arc::new(AtomicUsize::new(0));
        let counter = frames_processed.clone();
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let thread = std::thread::Builder::new()
            .name("earshot-output".into())
            .spawn(move || {
                let stream = match build_stream(&config, mixer, counter) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let _ = ready_tx.send(Ok(()));
                // Returns on stop or when the sender is dropped.
                let _ = stop_rx.recv();
                drop(stream);
                log::debug!("Output stream closed");
            })?;

        let started = ready_rx.recv().map_err(|_| {
            EarshotError::AudioDevice("Output thread exited before reporting".into())
        });
        if let Err(e) = started.and_then(|r| r) {
            let _ = thread.join();
            return Err(e);
        }

        log::info!(
            "Output stream started on {} ({} Hz, {} channel(s))",
            host_name,
            desc.frequency,
            desc.output_channels.count()
        );

        Ok(Self {
            host_name,
            frames_processed,
            stop: Some(stop_tx),
            thread: Some(thread),
        })
    }

    pub fn host_name(&self) -> &'static str {
        self.host_name
    }

    /// Frames handed to the device since the stream started.
    pub fn frames_processed(&self) -> usize {
        self.frames_processed.load(Ordering::Relaxed)
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("Output thread panicked");
            }
        }
    }
}

fn build_stream(
    config: &cpal::StreamConfig,
    mixer: MixerHandle,
    frames_processed: Arc<AtomicUsize>,
) -> Result<cpal::Stream> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| EarshotError::AudioDevice("No default output device available".into()))?;

    let default_config = device.default_output_config().map_err(|e| {
        EarshotError::AudioDevice(format!("Failed to get default config: {}", e))
    })?;

    let stream = match default_config.sample_format() {
        cpal::SampleFormat::F32 => create_stream::<f32>(&device, config, mixer, frames_processed)?,
        cpal::SampleFormat::I16 => create_stream::<i16>(&device, config, mixer, frames_processed)?,
        cpal::SampleFormat::U16 => create_stream::<u16>(&device, config, mixer, frames_processed)?,
        cpal::SampleFormat::I8 => create_stream::<i8>(&device, config, mixer, frames_processed)?,
        cpal::SampleFormat::U8 => create_stream::<u8>(&device, config, mixer, frames_processed)?,
        other => {
            return Err(EarshotError::AudioFormat(format!(
                "Unsupported sample format {:?}",
                other
            )));
        }
    };

    stream
        .play()
        .map_err(|e| EarshotError::AudioDevice(format!("Failed to start stream: {}", e)))?;
    Ok(stream)
}

fn create_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mixer: MixerHandle,
    frames_processed: Arc<AtomicUsize>,
) -> Result<cpal::Stream>
where
    T: SizedSample + FromSample<f32>,
{
    let mut scratch: Vec<f32> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0.0);
                let frames = mixer.render(&mut scratch);
                for (sample, value) in data.iter_mut().zip(&scratch) {
                    *sample = T::from_sample(*value);
                }
                frames_processed.fetch_add(frames, Ordering::Relaxed);
            },
            |err| log::error!("Audio stream error: {}", err),
            None,
        )
        .map_err(|e| EarshotError::AudioDevice(format!("Failed to build stream: {}", e)))
}
