//! The image shown while a derivative is rendering (or if it never arrives).

use image::{DynamicImage, RgbImage};
use tracing::debug;

use crate::config::DerivativeCacheConfig;
use crate::error::{CacheError, Result};
use crate::image::DerivativeImage;

const BUILTIN_SIDE: u32 = 24;
const BUILTIN_GRAY: u8 = 0x30;

/// Resolve the placeholder at cache startup.
///
/// A configured placeholder that cannot be loaded is a deployment error and
/// fails startup; with no configuration a neutral built-in raster is
/// synthesized instead.
pub(crate) fn load(config: &DerivativeCacheConfig) -> Result<DerivativeImage> {
    match &config.placeholder_path {
        Some(path) => {
            let image = image::open(path).map_err(|e| {
                CacheError::Placeholder(format!("cannot load {}: {e}", path.display()))
            })?;
            debug!(path = %path.display(), "placeholder loaded");
            Ok(DerivativeImage::new(image))
        }
        None => Ok(builtin()),
    }
}

fn builtin() -> DerivativeImage {
    let raster = RgbImage::from_pixel(
        BUILTIN_SIDE,
        BUILTIN_SIDE,
        image::Rgb([BUILTIN_GRAY, BUILTIN_GRAY, BUILTIN_GRAY]),
    );
    DerivativeImage::new(DynamicImage::ImageRgb8(raster))
}
