//! In-memory media source for tests and dry-runs.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use weavecast_protocol::{MediaMetadata, MediaSource};

/// A [`MediaSource`] backed by a byte vector.
///
/// Without configured metadata the probe fails, which models a corrupt
/// file. `with_declared_size` lets size-limit tests claim a large file
/// without allocating it.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    name: String,
    mime: String,
    data: Vec<u8>,
    declared_size: Option<u64>,
    metadata: Option<MediaMetadata>,
    probe_delay: Duration,
}

impl InMemorySource {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            data,
            declared_size: None,
            metadata: None,
            probe_delay: Duration::ZERO,
        }
    }

    /// Configures the metadata the probe reports.
    pub fn with_metadata(mut self, metadata: MediaMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Overrides the reported size without allocating the bytes.
    pub fn with_declared_size(mut self, size: u64) -> Self {
        self.declared_size = Some(size);
        self
    }

    /// Delays the probe, for timeout tests.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }
}

impl MediaSource for InMemorySource {
    fn file_name(&self) -> &str {
        &self.name
    }

    fn mime_type(&self) -> &str {
        &self.mime
    }

    fn size(&self) -> u64 {
        self.declared_size.unwrap_or(self.data.len() as u64)
    }

    fn read_all(&self) -> Pin<Box<dyn Future<Output = std::io::Result<Vec<u8>>> + Send + '_>> {
        Box::pin(async move { Ok(self.data.clone()) })
    }

    fn probe(&self) -> Pin<Box<dyn Future<Output = std::io::Result<MediaMetadata>> + Send + '_>> {
        Box::pin(async move {
            if !self.probe_delay.is_zero() {
                tokio::time::sleep(self.probe_delay).await;
            }
            self.metadata.ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidData, "unreadable media")
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_its_bytes() {
        let source = InMemorySource::new("a.mp4", "video/mp4", b"hello".to_vec());
        assert_eq!(source.size(), 5);
        assert_eq!(source.read_all().await.unwrap(), b"hello");
    }

    #[tokio::test]
    async fn probe_fails_without_metadata() {
        let source = InMemorySource::new("a.mp4", "video/mp4", b"hello".to_vec());
        assert!(source.probe().await.is_err());
    }

    #[test]
    fn declared_size_overrides_data_length() {
        let source = InMemorySource::new("a.mp4", "video/mp4", vec![0u8; 4])
            .with_declared_size(1_000_000);
        assert_eq!(source.size(), 1_000_000);
    }
}
