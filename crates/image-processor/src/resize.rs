//! Fit arbitrary images to the printer's dot width.

use image::imageops::FilterType;
use image::{DynamicImage, Rgba, RgbaImage};
use tracing::debug;

/// Resize an image to `width` dots keeping its aspect ratio, flattened onto
/// white paper.
///
/// Uses Lanczos3 filtering. Images already at the target width are only
/// flattened.
pub fn fit_to_width(img: &DynamicImage, width: u32) -> RgbaImage {
    let (orig_w, orig_h) = (img.width(), img.height());

    let resized = if orig_w == width {
        debug!(width, "Image already at target width, skipping resize");
        img.to_rgba8()
    } else {
        let ratio = f64::from(width) / f64::from(orig_w.max(1));
        let new_height = ((f64::from(orig_h) * ratio).round() as u32).max(1);
        debug!(orig_w, orig_h, new_width = width, new_height, "Resizing image to print width");
        img.resize_exact(width, new_height, FilterType::Lanczos3).to_rgba8()
    };

    flatten_on_white(&resized)
}

/// Alpha-blend every pixel onto a white background, leaving it opaque.
fn flatten_on_white(img: &RgbaImage) -> RgbaImage {
    RgbaImage::from_fn(img.width(), img.height(), |x, y| {
        let [r, g, b, a] = img.get_pixel(x, y).0;
        let alpha = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * alpha + 255 * (255 - alpha)) / 255) as u8;
        Rgba([blend(r), blend(g), blend(b), 255])
    })
}
