use crate::audio_data::{AudioDataLoader, DecodedBuffer, LoadOptions};
use crate::error::{Result, TracksideError};
use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions};
use symphonia::core::errors::Error;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// Decodes sound files with Symphonia.
///
/// Reads the first audio track to the end, skipping packets that fail to
/// decode, and resamples to [`LoadOptions::target_sample_rate`] when the file
/// rate differs.
pub struct DefaultAudioLoader;

/// The track being read from an opened file.
struct OpenedTrack {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    channels: u16,
}

impl AudioDataLoader for DefaultAudioLoader {
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<DecodedBuffer> {
        let mut track = open(path)?;
        let samples = decode_all(&mut track)?;
        if samples.is_empty() {
            return Err(TracksideError::AudioLoading(
                "File contains no audio frames".to_string(),
            ));
        }

        let buffer = DecodedBuffer::new(samples, track.sample_rate, track.channels);
        log::debug!(
            "Decoded {}: {} channels at {} Hz, {:.1} s",
            path.display(),
            track.channels,
            track.sample_rate,
            buffer.duration().as_secs_f32()
        );

        match options.target_sample_rate {
            Some(rate) if rate != buffer.sample_rate() => buffer.resample(rate),
            _ => Ok(buffer),
        }
    }
}

fn open(path: &Path) -> Result<OpenedTrack> {
    let file = File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let format = get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| TracksideError::AudioLoading(format!("Unrecognized format: {}", e)))?
        .format;

    let track = format
        .default_track()
        .ok_or_else(|| TracksideError::AudioLoading("No audio track".to_string()))?;
    let track_id = track.id;
    let params = &track.codec_params;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| TracksideError::AudioLoading("Unknown sample rate".to_string()))?;
    let channels = params
        .channels
        .map(|channels| channels.count() as u16)
        .ok_or_else(|| TracksideError::AudioLoading("Unknown channel layout".to_string()))?;
    let decoder = get_codecs()
        .make(params, &DecoderOptions::default())
        .map_err(|e| TracksideError::AudioLoading(format!("Unsupported codec: {}", e)))?;

    Ok(OpenedTrack {
        track_id,
        format,
        decoder,
        sample_rate,
        channels,
    })
}

/// Interleaved f32 samples of every packet in the track.
fn decode_all(track: &mut OpenedTrack) -> Result<Vec<f32>> {
    let mut samples = Vec::new();
    let mut scratch: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match track.format.next_packet() {
            Ok(packet) => packet,
            // End of stream
            Err(Error::IoError(_)) => break,
            Err(e) => {
                return Err(TracksideError::AudioLoading(format!("Unreadable packet: {}", e)));
            }
        };
        if packet.track_id() != track.track_id {
            continue;
        }

        let decoded = match track.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(Error::IoError(_)) => break,
            Err(Error::DecodeError(e)) => {
                log::debug!("Skipping corrupt packet: {}", e);
                continue;
            }
            Err(e) => {
                return Err(TracksideError::AudioLoading(format!("Decoding failed: {}", e)));
            }
        };

        // Reallocate only when a packet outgrows the scratch buffer
        let spec = *decoded.spec();
        let needed = decoded.capacity() * spec.channels.count();
        if scratch.as_ref().map_or(true, |buffer| buffer.capacity() < needed) {
            scratch = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(buffer) = scratch.as_mut() {
            buffer.copy_interleaved_ref(decoded);
            samples.extend_from_slice(buffer.samples());
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, sample_rate: u32, channels: u16, frames: usize) {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for i in 0..frames * channels as usize {
            let value = ((i as f32 * 0.05).sin() * 8000.0) as i16;
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_decode_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 48000, 2, 4800);

        let buffer = DefaultAudioLoader.load(&path, &LoadOptions::default()).unwrap();
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.channels(), 2);
        assert_eq!(buffer.total_frames(), 4800);
    }

    #[test]
    fn test_decode_resamples_to_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, 24000, 1, 2400);

        let options = LoadOptions::new().target_sample_rate(48000);
        let buffer = DefaultAudioLoader.load(&path, &options).unwrap();
        assert_eq!(buffer.sample_rate(), 48000);
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.total_frames(), 4800);
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = DefaultAudioLoader.load(&dir.path().join("missing.mp3"), &LoadOptions::default());
        assert!(matches!(result, Err(TracksideError::Io(_))));
    }

    #[test]
    fn test_garbage_file_is_loading_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.wav");
        std::fs::write(&path, b"definitely not a RIFF header").unwrap();
        let result = DefaultAudioLoader.load(&path, &LoadOptions::default());
        assert!(matches!(result, Err(TracksideError::AudioLoading(_))));
    }
}
