//! Media source contract.
//!
//! The file-picker layer (outside this workspace) hands the pipeline an
//! object with a name, a byte length, a MIME type, and async access to
//! its bytes and media metadata. Everything downstream works against
//! this trait so tests and dry-runs can supply in-memory sources.

use std::future::Future;
use std::pin::Pin;

/// Media metadata produced by probing a source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaMetadata {
    pub duration_secs: f64,
    pub width: u32,
    pub height: u32,
}

impl MediaMetadata {
    /// Width-to-height ratio, or 0.0 when the height is zero.
    pub fn aspect_ratio(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.width as f64 / self.height as f64
    }
}

/// A selected media file.
///
/// `probe` may take a while on a corrupt file; callers bound it with a
/// timeout. `read_all` is only invoked after validation has enforced
/// the size cap.
pub trait MediaSource: Send + Sync {
    /// Original file name, used for descriptive transaction tags.
    fn file_name(&self) -> &str;

    /// Declared MIME type.
    fn mime_type(&self) -> &str;

    /// Byte length.
    fn size(&self) -> u64;

    /// Reads the entire payload into memory.
    fn read_all(&self) -> Pin<Box<dyn Future<Output = std::io::Result<Vec<u8>>> + Send + '_>>;

    /// Probes duration and pixel dimensions. Fails on unreadable or
    /// corrupt media.
    fn probe(&self) -> Pin<Box<dyn Future<Output = std::io::Result<MediaMetadata>> + Send + '_>>;
}
