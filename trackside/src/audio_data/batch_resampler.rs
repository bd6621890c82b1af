use crate::error::{Result, TracksideError};
use rubato::{FftFixedIn, Resampler};

/// Frames per resampler pass.
const CHUNK_FRAMES: usize = 1024;

/// Converts a whole decoded file to the rendering rate in one go.
///
/// All channels share one FFT resampler. The filter delay is removed and the
/// padding trimmed, so `n` input frames come out as `round(n * ratio)` frames
/// aligned with the input.
pub struct BatchResampler {
    from_rate: u32,
    to_rate: u32,
    channels: usize,
}

impl BatchResampler {
    pub fn new(from_rate: u32, to_rate: u32, channels: u16) -> Result<Self> {
        if from_rate == 0 || to_rate == 0 {
            return Err(TracksideError::AudioFormat(format!(
                "Cannot resample {} Hz to {} Hz",
                from_rate, to_rate
            )));
        }
        if channels == 0 {
            return Err(TracksideError::AudioFormat(
                "Cannot resample audio without channels".to_string(),
            ));
        }

        Ok(Self {
            from_rate,
            to_rate,
            channels: channels as usize,
        })
    }

    /// Output frames per input frame.
    pub fn ratio(&self) -> f64 {
        self.to_rate as f64 / self.from_rate as f64
    }

    /// Resamples interleaved frames, keeping the interleaved layout.
    pub fn process(&self, interleaved: &[f32]) -> Result<Vec<f32>> {
        if self.from_rate == self.to_rate {
            return Ok(interleaved.to_vec());
        }

        let frames = interleaved.len() / self.channels;
        let planes = deinterleave(interleaved, self.channels, frames);

        let mut resampler = FftFixedIn::<f32>::new(
            self.from_rate as usize,
            self.to_rate as usize,
            CHUNK_FRAMES,
            2,
            self.channels,
        )
        .map_err(|e| TracksideError::AudioLoading(format!("Failed to create resampler: {}", e)))?;

        // Zero chunks past the end flush the filter delay out
        let delay = resampler.output_delay();
        let expected = (frames as f64 * self.ratio()).round() as usize;
        let mut chunk = vec![vec![0.0f32; CHUNK_FRAMES]; self.channels];
        let mut resampled: Vec<Vec<f32>> = vec![Vec::new(); self.channels];
        let mut start = 0;
        while resampled[0].len() < delay + expected {
            let len = (frames - start).min(CHUNK_FRAMES);
            for (input, plane) in chunk.iter_mut().zip(&planes) {
                input[..len].copy_from_slice(&plane[start..start + len]);
                input[len..].fill(0.0);
            }
            start += len;

            let output = resampler
                .process(&chunk, None)
                .map_err(|e| TracksideError::AudioLoading(format!("Resampling failed: {}", e)))?;
            for (plane, produced) in resampled.iter_mut().zip(output) {
                plane.extend(produced);
            }
        }

        for plane in &mut resampled {
            *plane = plane.split_off(delay);
        }
        Ok(interleave(&resampled, expected))
    }
}

fn deinterleave(interleaved: &[f32], channels: usize, frames: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| {
            interleaved
                .chunks_exact(channels)
                .take(frames)
                .map(|frame| frame[ch])
                .collect()
        })
        .collect()
}

fn interleave(planes: &[Vec<f32>], frames: usize) -> Vec<f32> {
    let frames = planes.iter().map(Vec::len).min().unwrap_or(0).min(frames);
    (0..frames)
        .flat_map(|i| planes.iter().map(move |plane| plane[i]))
        .collect()
}
