//! Orientation helpers for thermal printer output.
//!
//! The supported printers feed paper head-first, so the default output is the
//! raster rotated 180 degrees.

use tracing::debug;

/// Rotate boolean rows 180 degrees in place.
///
/// Row order is reversed and every row is mirrored.
pub fn rotate_rows_180(rows: &mut [Vec<bool>]) {
    debug!(rows = rows.len(), "Rotating rows 180 degrees");
    rows.reverse();
    for row in rows.iter_mut() {
        row.reverse();
    }
}
