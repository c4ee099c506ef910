//! Raster codec for thermal printer output.
//!
//! Converts an RGBA raster into packed 1bpp rows: luminance, dithering
//! (threshold, Floyd-Steinberg, Atkinson, halftone), 180 degree orientation,
//! LSB-first packing and minimum-length padding.

pub mod dither;
pub mod luminance;
pub mod pack;
pub mod resize;
pub mod rotate;

// Re-exports for convenience
pub use dither::{DEFAULT_THRESHOLD, DitherMethod};
pub use luminance::to_luminance;
pub use pack::{BitImage, MIN_FEED_ROWS, pack_row, unpack_row};
pub use resize::fit_to_width;
pub use rotate::rotate_rows_180;

use image::{GrayImage, RgbaImage};
use tracing::debug;

/// Standard thermal printer paper width in dots.
pub const PAPER_WIDTH: u32 = 384;

/// Errors produced while encoding a raster.
#[derive(Debug, thiserror::Error)]
pub enum RasterError {
    #[error("Invalid raster dimensions {width}x{height}: width must be a positive multiple of 8 and height > 0")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Row {row} has {actual} pixels, expected {expected}")]
    RaggedRow {
        row: usize,
        expected: usize,
        actual: usize,
    },

    #[error("Unknown dither method: {0}")]
    UnknownDitherMethod(String),
}

/// Settings for [`encode`].
#[derive(Debug, Clone)]
pub struct EncodeOptions {
    pub method: DitherMethod,
    pub threshold: u8,
    /// Rotate the output 180 degrees to match the paper feed direction.
    pub rotate_180: bool,
    /// Pad the packed buffer to at least this many rows.
    pub min_rows: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            method: DitherMethod::default(),
            threshold: DEFAULT_THRESHOLD,
            rotate_180: true,
            min_rows: MIN_FEED_ROWS,
        }
    }
}

/// Render the dithered raster as grayscale, for previews.
///
/// With [`DitherMethod::None`] the luminance is passed through unchanged.
pub fn preview(raster: &RgbaImage, method: DitherMethod, threshold: u8) -> GrayImage {
    dither::apply(&to_luminance(raster), method, threshold)
}

/// Binarize a raster into rows of ink flags (`true` = ink), top to bottom.
///
/// [`DitherMethod::None`] is reduced to plain thresholding here since the
/// printer only understands two levels.
pub fn binarize(raster: &RgbaImage, method: DitherMethod, threshold: u8) -> Vec<Vec<bool>> {
    let method = match method {
        DitherMethod::None => DitherMethod::Threshold,
        other => other,
    };
    let gray = preview(raster, method, threshold);
    gray.rows()
        .map(|row| row.map(|p| p.0[0] == 0).collect())
        .collect()
}

/// Full pipeline: binarize, orient, pack and pad.
pub fn encode(raster: &RgbaImage, options: &EncodeOptions) -> Result<BitImage, RasterError> {
    let (width, height) = raster.dimensions();
    if width == 0 || width % 8 != 0 || height == 0 {
        return Err(RasterError::InvalidDimensions { width, height });
    }
    debug!(width, height, method = %options.method, "Encoding raster");

    let mut rows = binarize(raster, options.method, options.threshold);
    if options.rotate_180 {
        rotate_rows_180(&mut rows);
    }

    let mut bitmap = BitImage::from_rows(width, &rows)?;
    bitmap.pad_to(options.min_rows * bitmap.bytes_per_row());
    Ok(bitmap)
}
