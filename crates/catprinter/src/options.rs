//! Print job options.
//!
//! These options control darkness, dithering and orientation. They are
//! translated into raster encoding settings and per-family command values.

use image_processor::{DEFAULT_THRESHOLD, DitherMethod, EncodeOptions, MIN_FEED_ROWS};

use crate::protocol::mxw01::MODE_MONOCHROME;

/// Default print darkness in percent.
pub const DEFAULT_INTENSITY: u8 = 80;

/// Configuration options for one print job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrintOptions {
    /// Darkness in percent (0..=100). Mapped to the intensity byte on MXW01
    /// and to speed/energy on GB printers.
    pub intensity: u8,

    /// Binarization algorithm.
    pub dither: DitherMethod,

    /// Gray level (0..=255) below which a pixel is inked when thresholding.
    pub threshold: u8,

    /// Rotate the image 180 degrees before printing. The print head feeds
    /// the last row first, so this is on by default.
    pub rotate_print: bool,

    /// MXW01 print mode byte.
    pub mode: u8,
}

impl Default for PrintOptions {
    fn default() -> Self {
        Self {
            intensity: DEFAULT_INTENSITY,
            dither: DitherMethod::default(),
            threshold: DEFAULT_THRESHOLD,
            rotate_print: true,
            mode: MODE_MONOCHROME,
        }
    }
}

impl PrintOptions {
    /// Create options with sensible defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: set print intensity.
    ///
    /// # Panics
    /// Panics if value is above 100.
    pub fn with_intensity(mut self, val: u8) -> Self {
        assert!(val <= 100, "Intensity must be between 0 and 100, got {val}");
        self.intensity = val;
        self
    }

    /// Builder: set dithering method.
    pub fn with_dither(mut self, val: DitherMethod) -> Self {
        self.dither = val;
        self
    }

    /// Builder: set threshold level.
    pub fn with_threshold(mut self, val: u8) -> Self {
        self.threshold = val;
        self
    }

    /// Builder: set rotate-print flag.
    pub fn with_rotate_print(mut self, val: bool) -> Self {
        self.rotate_print = val;
        self
    }

    /// Builder: set MXW01 print mode.
    pub fn with_mode(mut self, val: u8) -> Self {
        self.mode = val;
        self
    }

    pub fn encode_options(&self) -> EncodeOptions {
        EncodeOptions {
            method: self.dither,
            threshold: self.threshold,
            rotate_180: self.rotate_print,
            min_rows: MIN_FEED_ROWS,
        }
    }
}
