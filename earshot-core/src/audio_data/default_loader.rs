use crate::{
    audio_data::{AudioData, AudioDataLoader, ConvertToMono, LoadOptions},
    error::{EarshotError, Result},
};
use std::fs::File;
use std::path::Path;
use symphonia::{
    core::{
        audio::SampleBuffer, codecs::DecoderOptions, errors::Error, formats::FormatOptions,
        io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
    },
    default::{get_codecs, get_probe},
};

/// Audio loader backed by the Symphonia decoder library.
///
/// Decodes the whole file into interleaved f32 PCM. The file extension is used
/// as a probe hint only; content sniffing decides the actual format.
pub struct DefaultAudioLoader;

impl AudioDataLoader for DefaultAudioLoader {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<AudioData> {
        let file = File::open(path)?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                EarshotError::AudioLoading(format!("Failed to probe audio format: {}", e))
            })?;

        let mut format = probed.format;

        let track = format
            .default_track()
            .ok_or_else(|| EarshotError::AudioLoading("No default audio track found".to_string()))?;
        let track_id = track.id;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| EarshotError::AudioLoading("Sample rate not found".to_string()))?;

        let channels = track
            .codec_params
            .channels
            .ok_or_else(|| EarshotError::AudioLoading("Channel count not found".to_string()))?
            .count() as u16;

        let mut decoder = get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| EarshotError::AudioLoading(format!("Failed to create decoder: {}", e)))?;

        let mut samples: Vec<f32> = Vec::new();

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(Error::IoError(_)) => break, // end-of-file
                Err(e) => {
                    return Err(EarshotError::AudioLoading(format!(
                        "Error reading packet: {}",
                        e
                    )));
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(Error::IoError(_)) => break,
                Err(Error::DecodeError(_)) => continue, // recoverable corruption
                Err(e) => {
                    return Err(EarshotError::AudioLoading(format!(
                        "Error decoding packet: {}",
                        e
                    )));
                }
            };

            let spec = *decoded.spec();
            let mut tmp = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
            tmp.copy_interleaved_ref(decoded);
            samples.extend_from_slice(tmp.samples());
        }

        if samples.is_empty() {
            return Err(EarshotError::AudioLoading(format!(
                "No audio decoded from {}",
                path.display()
            )));
        }

        let audio_data = AudioData::from_samples(samples, sample_rate, channels);
        log::debug!(
            "Decoded {}: {} frames, {} Hz, {} channel(s)",
            path.display(),
            audio_data.total_frames(),
            sample_rate,
            channels
        );

        let audio_data = match options.convert_to_mono {
            ConvertToMono::Original => audio_data,
            ConvertToMono::ForceMono => audio_data.to_mono(),
        };
        match options.target_layout {
            Some((sample_rate, channels)) => audio_data.conform(sample_rate, channels),
            None => Ok(audio_data),
        }
    }
}
