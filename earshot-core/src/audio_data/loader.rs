use crate::audio_data::{AudioData, LoadOptions};
use crate::error::Result;
use std::path::Path;

/// Trait for loading audio data from file paths.
///
/// The software backend decodes through [`DefaultAudioLoader`](super::DefaultAudioLoader)
/// by default; implement this to plug in a different decoder.
///
/// # Example
///
/// ```ignore
/// use earshot_core::audio_data::{AudioData, AudioDataLoader, LoadOptions};
/// use earshot_core::error::Result;
/// use std::path::Path;
///
/// struct MyCustomLoader;
///
/// impl AudioDataLoader for MyCustomLoader {
///     fn load(&self, path: &Path, options: &LoadOptions) -> Result<AudioData> {
///         todo!()
///     }
/// }
/// ```
pub trait AudioDataLoader: Send + Sync {
    /// Loads and fully decodes the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an `EarshotError` if the file cannot be opened or decoded.
    fn load(&self, path: &Path, options: &LoadOptions) -> Result<AudioData>;
}
