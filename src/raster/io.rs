//! Convenience helpers for loading rasters via the `image` crate.
//!
//! Available when the `image-io` feature is enabled.

use std::path::Path;

use crate::raster::{OwnedRaster, RasterView};
use crate::util::{GateMatchError, GateMatchResult};

/// Creates a borrowed view over a grayscale image buffer.
pub fn view_from_gray_image(img: &image::GrayImage) -> GateMatchResult<RasterView<'_>> {
    RasterView::from_slice(img.as_raw(), img.width() as usize, img.height() as usize)
}

/// Copies a grayscale image buffer into an owned raster.
pub fn raster_from_gray_image(img: &image::GrayImage) -> GateMatchResult<OwnedRaster> {
    OwnedRaster::new(
        img.as_raw().clone(),
        img.width() as usize,
        img.height() as usize,
    )
}

/// Loads an image from disk and converts it to an owned grayscale raster.
pub fn load_gray_raster<P: AsRef<Path>>(path: P) -> GateMatchResult<OwnedRaster> {
    let img = image::open(path).map_err(|err| GateMatchError::ImageIo {
        reason: err.to_string(),
    })?;
    raster_from_gray_image(&img.to_luma8())
}
