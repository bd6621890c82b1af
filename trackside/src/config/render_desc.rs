use std::path::PathBuf;
use std::time::Duration;

/// Configuration descriptor for the rendering contexts and session timing
#[derive(Debug, Clone)]
pub struct RenderDesc {
    /// Sample rate of both rendering contexts; decoded sounds are resampled to it
    pub sample_rate: u32,
    /// Number of frames rendered per device callback
    pub block_size: usize,
    /// Number of output channels (typically 2 for stereo)
    pub channels: u16,
    /// Directory sound files are read from
    pub sound_dir: PathBuf,
    /// Number of background threads decoding sound files
    pub loader_threads: usize,
    /// Length of the linear ramp applied to every listener update
    pub interpolation_window: Duration,
    /// Delay between a session start and resuming playback
    pub settle_delay: Duration,
}

impl Default for RenderDesc {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            block_size: 1024,
            channels: 2,
            sound_dir: PathBuf::from("sounds"),
            loader_threads: 2,
            interpolation_window: Duration::from_millis(50),
            settle_delay: Duration::from_secs(1),
        }
    }
}
