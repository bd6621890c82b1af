use crate::audio_data::{DecodedBuffer, LoadOptions};
use crate::error::Result;
use std::path::Path;

/// Trait for decoding sound files into [`DecodedBuffer`]s.
///
/// The buffer cache calls loaders from background threads, hence the
/// `Send + Sync` bound. trackside ships a Symphonia-based implementation,
/// [`DefaultAudioLoader`](crate::audio_data::DefaultAudioLoader).
///
/// # Example
///
/// ```ignore
/// use trackside::audio_data::{AudioDataLoader, DecodedBuffer, LoadOptions};
/// use trackside::error::Result;
/// use std::path::Path;
///
/// struct SilenceLoader;
///
/// impl AudioDataLoader for SilenceLoader {
///     fn load(&self, _path: &Path, _options: &LoadOptions) -> Result<DecodedBuffer> {
///         Ok(DecodedBuffer::new(vec![0.0; 48000], 48000, 1))
///     }
/// }
/// ```
pub trait AudioDataLoader: Send + Sync {
    /// Reads and decodes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or decoded.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<DecodedBuffer>;
}
