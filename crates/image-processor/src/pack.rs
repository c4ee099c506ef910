//! 1bpp bit packing for the printer wire format.
//!
//! Bit `n` of byte `k` in a row is pixel `k * 8 + n` (LSB first); a set bit
//! is ink.

use tracing::debug;

use crate::RasterError;

/// Printers refuse to feed less than this many rows worth of data.
pub const MIN_FEED_ROWS: usize = 90;

/// Pack a row of ink flags into bytes, LSB first.
pub fn pack_row(row: &[bool]) -> Vec<u8> {
    row.chunks(8)
        .map(|chunk| {
            chunk
                .iter()
                .enumerate()
                .fold(0u8, |byte, (bit, &ink)| if ink { byte | (1 << bit) } else { byte })
        })
        .collect()
}

/// Inverse of [`pack_row`] for a row of `width` pixels.
pub fn unpack_row(bytes: &[u8], width: usize) -> Vec<bool> {
    (0..width)
        .map(|i| bytes.get(i / 8).is_some_and(|b| b & (1 << (i % 8)) != 0))
        .collect()
}

/// A packed, padded bitmap ready to stream to a printer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitImage {
    width: u32,
    content_rows: u32,
    data: Vec<u8>,
}

impl BitImage {
    /// Pack binarized rows. Every row must be exactly `width` pixels and
    /// `width` must be a positive multiple of 8.
    pub fn from_rows(width: u32, rows: &[Vec<bool>]) -> Result<Self, RasterError> {
        if width == 0 || width % 8 != 0 || rows.is_empty() {
            return Err(RasterError::InvalidDimensions {
                width,
                height: rows.len() as u32,
            });
        }
        let bytes_per_row = width as usize / 8;
        let mut data = Vec::with_capacity(bytes_per_row * rows.len());
        for (y, row) in rows.iter().enumerate() {
            if row.len() != width as usize {
                return Err(RasterError::RaggedRow {
                    row: y,
                    expected: width as usize,
                    actual: row.len(),
                });
            }
            data.extend(pack_row(row));
        }
        Ok(Self {
            width,
            content_rows: rows.len() as u32,
            data,
        })
    }

    /// Append blank rows until the buffer holds at least `min_bytes`.
    pub fn pad_to(&mut self, min_bytes: usize) {
        if self.data.len() >= min_bytes {
            return;
        }
        let bytes_per_row = self.bytes_per_row();
        let rows_needed = min_bytes.div_ceil(bytes_per_row);
        debug!(
            content_rows = self.content_rows,
            padded_rows = rows_needed,
            "Padding bitmap to minimum feed length"
        );
        self.data.resize(rows_needed * bytes_per_row, 0);
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn bytes_per_row(&self) -> usize {
        self.width as usize / 8
    }

    /// Rows that carried image content before padding.
    pub fn content_rows(&self) -> u32 {
        self.content_rows
    }

    /// Total rows including padding.
    pub fn row_count(&self) -> usize {
        self.data.len() / self.bytes_per_row()
    }

    pub fn rows(&self) -> std::slice::Chunks<'_, u8> {
        self.data.chunks(self.bytes_per_row())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}
