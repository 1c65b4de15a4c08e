//! Port for the metadata collaborator plus a file-backed EXIF implementation.
//!
//! The cache only needs two facts about a photograph: which way is up, and
//! whether the camera embedded a low-resolution thumbnail worth reusing.
//! Everything else EXIF carries (time, GPS, lens data) belongs to other
//! subsystems.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use async_trait::async_trait;
use exif::{Exif, In, Tag};
use lightbox_model::{Orientation, SourceId};
use tracing::debug;

use crate::error::{CacheError, Result};

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Display orientation recorded for the source. Sources without usable
    /// metadata report `Normal`.
    async fn orientation(&self, source: &SourceId) -> Result<Orientation>;

    /// Raw bytes of the EXIF-embedded thumbnail, if the camera wrote one.
    async fn embedded_thumbnail(&self, source: &SourceId) -> Result<Option<Vec<u8>>>;
}

/// Reads orientation and the embedded thumbnail straight from the source
/// file's EXIF segment. Parsing runs on the blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExifMetadataProvider;

impl ExifMetadataProvider {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl MetadataProvider for ExifMetadataProvider {
    async fn orientation(&self, source: &SourceId) -> Result<Orientation> {
        let path = source.as_path().to_owned();
        spawn_exif(move || {
            let orientation = read_exif(&path)?
                .and_then(|exif| {
                    exif.get_field(Tag::Orientation, In::PRIMARY)
                        .and_then(|field| field.value.get_uint(0))
                })
                .map(Orientation::from_exif_code)
                .unwrap_or_default();
            Ok(orientation)
        })
        .await
    }

    async fn embedded_thumbnail(&self, source: &SourceId) -> Result<Option<Vec<u8>>> {
        let path = source.as_path().to_owned();
        spawn_exif(move || Ok(read_exif(&path)?.as_ref().and_then(embedded_jpeg))).await
    }
}

async fn spawn_exif<T, F>(work: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| CacheError::Internal(format!("EXIF task panicked: {e}")))?
}

/// Parse the EXIF segment of a file. `Ok(None)` covers the common cases of a
/// file without metadata or with a segment we cannot parse; only I/O failures
/// surface as errors.
fn read_exif(path: &Path) -> Result<Option<Exif>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    match exif::Reader::new().read_from_container(&mut reader) {
        Ok(exif) => Ok(Some(exif)),
        Err(exif::Error::Io(e)) => Err(CacheError::Io(e)),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "no usable EXIF segment");
            Ok(None)
        }
    }
}

/// Locate the embedded JPEG thumbnail inside the raw TIFF buffer via the
/// IFD1 interchange-format pointers.
fn embedded_jpeg(exif: &Exif) -> Option<Vec<u8>> {
    let offset = exif
        .get_field(Tag::JPEGInterchangeFormat, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;
    let len = exif
        .get_field(Tag::JPEGInterchangeFormatLength, In::THUMBNAIL)?
        .value
        .get_uint(0)? as usize;

    let buf = exif.buf();
    let end = offset.checked_add(len)?;
    if end > buf.len() || len == 0 {
        return None;
    }
    Some(buf[offset..end].to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn file_without_exif_reads_as_normal_orientation() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plain.png");
        let img = image::RgbImage::from_pixel(8, 8, image::Rgb([1, 2, 3]));
        img.save(&path).expect("save png");

        let provider = ExifMetadataProvider::new();
        let source = SourceId::from(path.as_path());

        let orientation = provider.orientation(&source).await.expect("orientation");
        assert_eq!(orientation, Orientation::Normal);

        let thumb = provider
            .embedded_thumbnail(&source)
            .await
            .expect("thumbnail");
        assert!(thumb.is_none());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let provider = ExifMetadataProvider::new();
        let source = SourceId::from("/nonexistent/photo.jpg");
        assert!(matches!(
            provider.orientation(&source).await,
            Err(CacheError::Io(_))
        ));
    }
}
