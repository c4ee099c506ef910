//! RGBA raster to luminance conversion.

use image::{Luma, RgbaImage};

use crate::dither::LumaImage;

/// Pixels with alpha below this value are treated as blank paper.
pub const ALPHA_CUTOFF: u8 = 128;

/// ITU-R BT.601 luma of an opaque pixel.
#[inline]
pub fn luminance(r: u8, g: u8, b: u8) -> f32 {
    0.299 * f32::from(r) + 0.587 * f32::from(g) + 0.114 * f32::from(b)
}

/// Convert an RGBA raster into a luminance buffer.
///
/// Transparent pixels (alpha < 128) become white.
pub fn to_luminance(raster: &RgbaImage) -> LumaImage {
    LumaImage::from_fn(raster.width(), raster.height(), |x, y| {
        let [r, g, b, a] = raster.get_pixel(x, y).0;
        if a < ALPHA_CUTOFF {
            Luma([255.0])
        } else {
            Luma([luminance(r, g, b)])
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn test_luminance_weights() {
        assert_eq!(luminance(0, 0, 0), 0.0);
        assert!((luminance(255, 255, 255) - 255.0).abs() < 0.01);
        assert!((luminance(255, 0, 0) - 76.245).abs() < 0.01);
        assert!((luminance(0, 255, 0) - 149.685).abs() < 0.01);
        assert!((luminance(0, 0, 255) - 29.07).abs() < 0.01);
    }

    #[test]
    fn test_transparent_pixels_are_white() {
        let mut raster = RgbaImage::from_pixel(2, 1, Rgba([0, 0, 0, 127]));
        raster.put_pixel(1, 0, Rgba([0, 0, 0, 128]));
        let lum = to_luminance(&raster);
        assert_eq!(lum.get_pixel(0, 0).0[0], 255.0);
        assert_eq!(lum.get_pixel(1, 0).0[0], 0.0);
    }
}
