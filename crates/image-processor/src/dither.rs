//! Dithering algorithms for converting luminance rasters to black-and-white.
//!
//! Every binarizing method produces a `GrayImage` where 0 is ink and 255 is
//! blank paper. `DitherMethod::None` keeps the grayscale values for previews.

use std::fmt;
use std::str::FromStr;

use image::{GrayImage, ImageBuffer, Luma};
use tracing::debug;

use crate::RasterError;

/// Default threshold value for binarization.
pub const DEFAULT_THRESHOLD: u8 = 128;

/// Single-channel floating point luminance buffer (0.0 = black, 255.0 = white).
pub type LumaImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// 4x4 ordered-dither tile, raw ranks 0..=15.
const BAYER_4X4: [[u8; 4]; 4] = [[0, 8, 2, 10], [12, 4, 14, 6], [3, 11, 1, 9], [15, 7, 13, 5]];

/// Binarization strategy applied to a raster before bit packing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum DitherMethod {
    /// Ink iff luminance is below the threshold.
    Threshold,
    /// Error diffusion to right, bottom-left, bottom and bottom-right.
    #[default]
    FloydSteinberg,
    /// Classic Atkinson diffusion (only 6/8 of the error is propagated).
    Atkinson,
    /// Ordered dithering with a 4x4 Bayer tile.
    Halftone,
    /// Grayscale pass-through, for previews.
    None,
}

impl DitherMethod {
    pub const ALL: [DitherMethod; 5] = [
        DitherMethod::Threshold,
        DitherMethod::FloydSteinberg,
        DitherMethod::Atkinson,
        DitherMethod::Halftone,
        DitherMethod::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DitherMethod::Threshold => "threshold",
            DitherMethod::FloydSteinberg => "floyd-steinberg",
            DitherMethod::Atkinson => "atkinson",
            DitherMethod::Halftone => "halftone",
            DitherMethod::None => "none",
        }
    }
}

impl fmt::Display for DitherMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DitherMethod {
    type Err = RasterError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('_', "-");
        match normalized.as_str() {
            "threshold" => Ok(DitherMethod::Threshold),
            "floyd-steinberg" | "floydsteinberg" | "fs" => Ok(DitherMethod::FloydSteinberg),
            "atkinson" => Ok(DitherMethod::Atkinson),
            "halftone" | "bayer" => Ok(DitherMethod::Halftone),
            "none" => Ok(DitherMethod::None),
            _ => Err(RasterError::UnknownDitherMethod(s.to_string())),
        }
    }
}

/// Apply the given method to a luminance buffer.
pub fn apply(lum: &LumaImage, method: DitherMethod, threshold: u8) -> GrayImage {
    match method {
        DitherMethod::Threshold => threshold_dither(lum, threshold),
        DitherMethod::FloydSteinberg => floyd_steinberg_dither(lum, threshold),
        DitherMethod::Atkinson => atkinson_dither(lum, threshold),
        DitherMethod::Halftone => halftone_dither(lum),
        DitherMethod::None => passthrough(lum),
    }
}

#[inline]
fn quantize(value: f32, threshold: u8) -> f32 {
    if value < f32::from(threshold) { 0.0 } else { 255.0 }
}

/// Threshold a luminance buffer.
pub fn threshold_dither(lum: &LumaImage, threshold: u8) -> GrayImage {
    let (width, height) = lum.dimensions();
    debug!(width, height, threshold, "Applying threshold conversion");

    GrayImage::from_fn(width, height, |x, y| {
        Luma([quantize(lum.get_pixel(x, y).0[0], threshold) as u8])
    })
}

/// Threshold an already grayscale image.
///
/// Pixels with values >= `threshold` become white (255), others become black (0).
pub fn threshold_convert(img: &GrayImage, threshold: u8) -> GrayImage {
    threshold_dither(&to_luma(img), threshold)
}

/// Apply Floyd-Steinberg dithering in raster order (no serpentine).
///
/// Error distribution pattern:
/// - Right:        7/16
/// - Bottom-left:  3/16
/// - Bottom:       5/16
/// - Bottom-right: 1/16
pub fn floyd_steinberg_dither(lum: &LumaImage, threshold: u8) -> GrayImage {
    let (width, height) = lum.dimensions();
    debug!(width, height, "Applying Floyd-Steinberg dithering");

    let mut buffer = ErrorBuffer::new(lum);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let old = buffer.get(x, y);
            let new = quantize(old, threshold);
            buffer.set(x, y, new);

            let error = old - new;
            buffer.add(x + 1, y, error * 7.0 / 16.0);
            buffer.add(x - 1, y + 1, error * 3.0 / 16.0);
            buffer.add(x, y + 1, error * 5.0 / 16.0);
            buffer.add(x + 1, y + 1, error / 16.0);
        }
    }

    buffer.quantize(threshold)
}

/// Apply Atkinson dithering.
///
/// The quantization error is floored to eighths and pushed to six
/// neighbours, so 2/8 of it is discarded.
pub fn atkinson_dither(lum: &LumaImage, threshold: u8) -> GrayImage {
    let (width, height) = lum.dimensions();
    debug!(width, height, "Applying Atkinson dithering");

    let mut buffer = ErrorBuffer::new(lum);
    for y in 0..height as i64 {
        for x in 0..width as i64 {
            let old = buffer.get(x, y);
            let new = quantize(old, threshold);
            buffer.set(x, y, new);

            let share = ((old - new) / 8.0).floor();
            for (dx, dy) in [(1, 0), (2, 0), (-1, 1), (0, 1), (1, 1), (0, 2)] {
                buffer.add(x + dx, y + dy, share);
            }
        }
    }

    buffer.quantize(threshold)
}

/// Bayer threshold for tile cell `(row, col)`, spread over 0..=255.
pub fn bayer_threshold(row: usize, col: usize) -> f32 {
    (f32::from(BAYER_4X4[row % 4][col % 4]) + 0.5) * 255.0 / 16.0
}

/// Apply ordered (halftone) dithering with a 4x4 Bayer tile indexed by `(y % 4, x % 4)`.
pub fn halftone_dither(lum: &LumaImage) -> GrayImage {
    let (width, height) = lum.dimensions();
    debug!(width, height, "Applying halftone dithering");

    GrayImage::from_fn(width, height, |x, y| {
        let value = lum.get_pixel(x, y).0[0];
        let ink = value < bayer_threshold(y as usize, x as usize);
        Luma([if ink { 0 } else { 255 }])
    })
}

/// Round luminance back to 8-bit grayscale without binarizing.
pub fn passthrough(lum: &LumaImage) -> GrayImage {
    GrayImage::from_fn(lum.width(), lum.height(), |x, y| {
        Luma([lum.get_pixel(x, y).0[0].round().clamp(0.0, 255.0) as u8])
    })
}

/// Widen an 8-bit grayscale image into a luminance buffer.
pub fn to_luma(img: &GrayImage) -> LumaImage {
    LumaImage::from_fn(img.width(), img.height(), |x, y| {
        Luma([f32::from(img.get_pixel(x, y).0[0])])
    })
}

/// Floating point working buffer shared by the error-diffusion methods.
struct ErrorBuffer {
    width: i64,
    height: i64,
    values: Vec<f32>,
}

impl ErrorBuffer {
    fn new(lum: &LumaImage) -> Self {
        Self {
            width: i64::from(lum.width()),
            height: i64::from(lum.height()),
            values: lum.as_raw().clone(),
        }
    }

    fn index(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width || y >= self.height {
            return None;
        }
        Some((y * self.width + x) as usize)
    }

    fn get(&self, x: i64, y: i64) -> f32 {
        self.index(x, y).map_or(255.0, |i| self.values[i])
    }

    fn set(&mut self, x: i64, y: i64, value: f32) {
        if let Some(i) = self.index(x, y) {
            self.values[i] = value;
        }
    }

    fn add(&mut self, x: i64, y: i64, delta: f32) {
        if let Some(i) = self.index(x, y) {
            self.values[i] += delta;
        }
    }

    /// Second pass: re-quantize the accumulated buffer into 0/255.
    fn quantize(self, threshold: u8) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            Luma([quantize(self.get(i64::from(x), i64::from(y)), threshold) as u8])
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Create a small test image with a gradient pattern.
    fn create_gradient_image(width: u32, height: u32) -> LumaImage {
        LumaImage::from_fn(width, height, |x, y| {
            Luma([((x + y) * 255 / (width + height - 2)) as f32])
        })
    }

    fn uniform(width: u32, height: u32, value: f32) -> LumaImage {
        LumaImage::from_pixel(width, height, Luma([value]))
    }

    fn assert_binary(img: &GrayImage) {
        for (x, y, p) in img.enumerate_pixels() {
            let val = p.0[0];
            assert!(val == 0 || val == 255, "Pixel ({x}, {y}) = {val}, expected 0 or 255");
        }
    }

    #[test]
    fn test_binarizing_methods_output_is_binary() {
        let img = create_gradient_image(16, 16);
        for method in DitherMethod::ALL {
            if method == DitherMethod::None {
                continue;
            }
            let result = apply(&img, method, DEFAULT_THRESHOLD);
            assert_eq!(result.dimensions(), (16, 16), "{method}");
            assert_binary(&result);
        }
    }

    #[test]
    fn test_error_diffusion_keeps_uniform_fields() {
        for method in [DitherMethod::FloydSteinberg, DitherMethod::Atkinson] {
            let white = apply(&uniform(12, 9, 255.0), method, DEFAULT_THRESHOLD);
            assert!(white.pixels().all(|p| p.0[0] == 255), "{method} on white");

            let black = apply(&uniform(12, 9, 0.0), method, DEFAULT_THRESHOLD);
            assert!(black.pixels().all(|p| p.0[0] == 0), "{method} on black");
            assert_eq!(black.dimensions(), (12, 9), "{method}");
        }
    }

    #[test]
    fn test_error_diffusion_keeps_pixel_positions() {
        // Left column black, rest white, on a non-square image.
        let img = LumaImage::from_fn(5, 3, |x, _| Luma([if x == 0 { 0.0 } else { 255.0 }]));
        for method in [DitherMethod::FloydSteinberg, DitherMethod::Atkinson] {
            let result = apply(&img, method, DEFAULT_THRESHOLD);
            assert_eq!(result.dimensions(), (5, 3), "{method}");
            for (x, y, p) in result.enumerate_pixels() {
                let expected = if x == 0 { 0 } else { 255 };
                assert_eq!(p.0[0], expected, "{method} at ({x}, {y})");
            }
        }
    }

    #[test]
    fn test_floyd_steinberg_mid_gray_mixes_ink() {
        let result = floyd_steinberg_dither(&uniform(16, 16, 127.0), DEFAULT_THRESHOLD);
        let ink = result.pixels().filter(|p| p.0[0] == 0).count();
        assert!(ink > 64 && ink < 192, "ink count {ink}");
    }

    #[test]
    fn test_atkinson_spreads_error_two_rows_down() {
        let mut img = uniform(3, 3, 255.0);
        img.put_pixel(0, 0, Luma([120.0]));
        let result = atkinson_dither(&img, DEFAULT_THRESHOLD);
        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        // 120 / 8 = 15 lands on (0, 2) among others; white stays white.
        assert_eq!(result.get_pixel(0, 2).0[0], 255);
        assert_binary(&result);
    }

    #[test]
    fn test_threshold_convert_basic() {
        let mut img = GrayImage::new(4, 1);
        img.put_pixel(0, 0, Luma([0]));
        img.put_pixel(1, 0, Luma([127]));
        img.put_pixel(2, 0, Luma([128]));
        img.put_pixel(3, 0, Luma([255]));

        let result = threshold_convert(&img, 128);

        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        assert_eq!(result.get_pixel(1, 0).0[0], 0);
        assert_eq!(result.get_pixel(2, 0).0[0], 255);
        assert_eq!(result.get_pixel(3, 0).0[0], 255);
    }

    #[test]
    fn test_threshold_is_idempotent() {
        let once = threshold_dither(&create_gradient_image(10, 6), 90);
        let twice = threshold_convert(&once, 90);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_halftone_uses_tile_position() {
        // Mid gray falls below half of the 16 tile thresholds.
        let result = halftone_dither(&uniform(4, 4, 128.0));
        let ink = result.pixels().filter(|p| p.0[0] == 0).count();
        assert_eq!(ink, 8);

        // Pure black is below every threshold, pure white above every one.
        assert!(halftone_dither(&uniform(8, 8, 0.0)).pixels().all(|p| p.0[0] == 0));
        assert!(halftone_dither(&uniform(8, 8, 255.0)).pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_bayer_threshold_range() {
        for row in 0..4 {
            for col in 0..4 {
                let t = bayer_threshold(row, col);
                assert!(t > 0.0 && t < 255.0);
            }
        }
        assert_eq!(bayer_threshold(4, 5), bayer_threshold(0, 1));
    }

    #[test]
    fn test_passthrough_keeps_grayscale() {
        let result = passthrough(&uniform(3, 2, 99.6));
        assert!(result.pixels().all(|p| p.0[0] == 100));
    }

    #[test]
    fn test_method_parsing() {
        for method in DitherMethod::ALL {
            assert_eq!(method.as_str().parse::<DitherMethod>().unwrap(), method);
        }
        assert_eq!("Floyd_Steinberg".parse::<DitherMethod>().unwrap(), DitherMethod::FloydSteinberg);
        assert!("sepia".parse::<DitherMethod>().is_err());
    }
}
