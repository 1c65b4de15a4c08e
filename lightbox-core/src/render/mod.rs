//! Turns source pixels into a correctly oriented, size-bounded derivative.
//!
//! Everything here is synchronous and CPU-bound; callers run it inside
//! `spawn_blocking`. The render itself has no knowledge of the store or the
//! request table, which keeps the geometry testable in isolation.

use image::imageops::FilterType;
use image::{DynamicImage, ImageReader};
use lightbox_model::{DerivativeKey, Orientation};
use std::io::Cursor;

use crate::error::Result;
use crate::image::DerivativeImage;

/// Fixed inset so adjacent thumbnails keep a visible margin against their
/// black background.
pub(crate) const BORDER: u32 = 1;

/// Pre-rotation raster dimensions after scaling `(src_w, src_h)` to fit the
/// target box, border inset applied, aspect ratio preserved.
///
/// The scale factor is computed against the *logical* (orientation-corrected)
/// source dimensions so a quarter-turned photo fills the box it will occupy
/// after rotation. Derivatives are never upscaled.
pub(crate) fn scaled_dimensions(
    src_w: u32,
    src_h: u32,
    target_w: u32,
    target_h: u32,
    orientation: Orientation,
) -> (u32, u32) {
    let (logical_w, logical_h) = orientation.corrected_dimensions(src_w, src_h);

    let avail_w = f64::from(target_w.saturating_sub(2 * BORDER).max(1));
    let avail_h = f64::from(target_h.saturating_sub(2 * BORDER).max(1));

    let scale = (avail_w / f64::from(logical_w))
        .min(avail_h / f64::from(logical_h))
        .min(1.0);

    let scaled_w = (f64::from(src_w) * scale).round() as u32;
    let scaled_h = (f64::from(src_h) * scale).round() as u32;
    (scaled_w.max(1), scaled_h.max(1))
}

/// Scale a decoded source into the target box and rotate it upright.
///
/// For the quarter-turn orientations the final canvas swaps axes relative to
/// the plain scaled raster.
pub(crate) fn render_decoded(
    source: &DynamicImage,
    target_w: u32,
    target_h: u32,
    orientation: Orientation,
) -> DerivativeImage {
    let (scaled_w, scaled_h) = scaled_dimensions(
        source.width(),
        source.height(),
        target_w,
        target_h,
        orientation,
    );

    let scaled = source.resize_exact(scaled_w, scaled_h, FilterType::Triangle);

    let oriented = match orientation {
        Orientation::Normal => scaled,
        Orientation::Rotate90Cw => scaled.rotate90(),
        Orientation::Rotate180 => scaled.rotate180(),
        Orientation::Rotate270Cw => scaled.rotate270(),
    };

    DerivativeImage::new(oriented)
}

/// Decode raw source bytes and render them into the target box.
pub(crate) fn render_from_bytes(
    bytes: &[u8],
    target_w: u32,
    target_h: u32,
    orientation: Orientation,
) -> Result<DerivativeImage> {
    let source = image::load_from_memory(bytes)?;
    Ok(render_decoded(&source, target_w, target_h, orientation))
}

/// Cheap header-only dimension probe; `None` when the bytes are not a
/// recognizable image.
pub(crate) fn probe_dimensions(bytes: &[u8]) -> Option<(u32, u32)> {
    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?
        .into_dimensions()
        .ok()
}

/// Whether an EXIF-embedded thumbnail with the given raw dimensions can
/// satisfy the request without upscaling.
///
/// Rotatable requests compare the long edges only; exact requests accept the
/// embedded raster when either orientation-corrected edge covers the
/// corresponding requested edge.
pub(crate) fn embedded_thumbnail_usable(
    embedded_w: u32,
    embedded_h: u32,
    key: &DerivativeKey,
    rotatable: bool,
    orientation: Orientation,
) -> bool {
    if rotatable {
        embedded_w.max(embedded_h) >= key.width.max(key.height)
    } else {
        let (corrected_w, corrected_h) =
            orientation.corrected_dimensions(embedded_w, embedded_h);
        corrected_h >= key.height || corrected_w >= key.width
    }
}
