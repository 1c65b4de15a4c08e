//! The immutable decoded raster handed back to consumers.

use std::io::Cursor;
use std::sync::Arc;

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

use crate::error::Result;

/// A rendered derivative: a decoded raster, immutable once produced.
///
/// Cloning is cheap (the pixel buffer is shared), so the coordinator can hand
/// the same derivative to many waiting consumers without copying pixels.
#[derive(Debug, Clone)]
pub struct DerivativeImage {
    raster: Arc<DynamicImage>,
}

impl DerivativeImage {
    pub fn new(raster: DynamicImage) -> Self {
        Self {
            raster: Arc::new(raster),
        }
    }

    pub fn width(&self) -> u32 {
        self.raster.width()
    }

    pub fn height(&self) -> u32 {
        self.raster.height()
    }

    pub fn raster(&self) -> &DynamicImage {
        &self.raster
    }

    /// Decode a stored derivative from its persisted encoding.
    pub(crate) fn from_encoded(bytes: &[u8]) -> Result<Self> {
        Ok(Self::new(image::load_from_memory(bytes)?))
    }

    /// Encode for persistence as JPEG at the given quality.
    ///
    /// JPEG has no alpha channel, so the raster is flattened to RGB first.
    pub(crate) fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buffer), quality);
        self.raster.to_rgb8().write_with_encoder(encoder)?;
        Ok(buffer)
    }
}
