/// Options for controlling audio file loading behavior.
///
/// # Examples
///
/// ```no_run
/// # use trackside::audio_data::LoadOptions;
/// // Decode and resample to the rendering rate
/// let options = LoadOptions::new().target_sample_rate(48000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Resample decoded audio to this rate. `None` keeps the file's rate.
    pub target_sample_rate: Option<u32>,
}

impl LoadOptions {
    /// Creates a new `LoadOptions` with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the sample rate decoded audio is converted to.
    pub fn target_sample_rate(mut self, rate: u32) -> Self {
        self.target_sample_rate = Some(rate);
        self
    }
}
