mod batch_resampler;
mod default_loader;
mod load_options;
mod loader;

use crate::error::Result;
pub use batch_resampler::BatchResampler;
pub use default_loader::DefaultAudioLoader;
pub use load_options::LoadOptions;
pub use loader::AudioDataLoader;
use std::time::Duration;

/// Decoded PCM for one sound file.
///
/// # Data Format
/// Samples are stored **INTERLEAVED**, frame by frame:
/// - Stereo: `[L0, R0, L1, R1, ...]`
/// - Mono: `[M0, M1, M2, ...]`
///
/// Buffers are immutable once decoded and shared between voices through
/// `Arc<DecodedBuffer>`.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
    channels: u16,
    total_frames: usize,
}

impl DecodedBuffer {
    /// Wraps interleaved samples. A trailing partial frame is ignored.
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        let channels = channels.max(1);
        let total_frames = samples.len() / channels as usize;
        Self {
            samples,
            sample_rate,
            channels,
            total_frames,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn total_frames(&self) -> usize {
        self.total_frames
    }

    pub fn is_empty(&self) -> bool {
        self.total_frames == 0
    }

    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.total_frames as f64 / self.sample_rate as f64)
    }

    /// Frame `index` as a stereo pair. Mono is duplicated to both sides and
    /// channels beyond the second are dropped.
    pub fn stereo_frame(&self, index: usize) -> (f32, f32) {
        if index >= self.total_frames {
            return (0.0, 0.0);
        }
        let channels = self.channels as usize;
        let base = index * channels;
        let left = self.samples[base];
        let right = if channels > 1 {
            self.samples[base + 1]
        } else {
            left
        };
        (left, right)
    }

    /// Returns a copy resampled to `target_sample_rate`.
    pub fn resample(&self, target_sample_rate: u32) -> Result<Self> {
        if target_sample_rate == self.sample_rate {
            return Ok(self.clone());
        }

        let samples = BatchResampler::new(self.sample_rate, target_sample_rate, self.channels)?
            .process(&self.samples)?;

        log::debug!(
            "Resampled {} frames at {} Hz to {} frames at {} Hz",
            self.total_frames,
            self.sample_rate,
            samples.len() / self.channels as usize,
            target_sample_rate
        );

        Ok(Self::new(samples, target_sample_rate, self.channels))
    }
}
