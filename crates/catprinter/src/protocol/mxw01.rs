//! MXW01 series (framed family) command set.
//!
//! Magic bytes: 0x22, 0x21
//! Characteristics: AE01 (Control), AE02 (Notify), AE03 (Data).
//! Requests are acknowledged on the notify channel with the same command id;
//! bitmap rows go out on the data channel without framing.

use super::{Family, build_frame};

/// MXW01 magic bytes.
pub const MAGIC: [u8; 2] = [0x22, 0x21];

// -- MXW01 Command IDs --
pub const CMD_GET_STATUS: u8 = 0xa1;
pub const CMD_SET_INTENSITY: u8 = 0xa2;
pub const CMD_PRINT_REQUEST: u8 = 0xa9;
pub const CMD_PRINT_COMPLETE: u8 = 0xaa;
pub const CMD_GET_BATTERY: u8 = 0xab;
pub const CMD_FLUSH: u8 = 0xad;

/// Fixed byte in the print request between row count and mode.
const PRINT_REQUEST_MAGIC: u8 = 0x30;

/// Print mode 0: 1bpp monochrome.
pub const MODE_MONOCHROME: u8 = 0x00;

pub fn get_status() -> Vec<u8> {
    build_frame(Family::Mxw01, CMD_GET_STATUS, &[0x00])
}

pub fn get_battery() -> Vec<u8> {
    build_frame(Family::Mxw01, CMD_GET_BATTERY, &[0x00])
}

pub fn set_intensity(intensity: u8) -> Vec<u8> {
    build_frame(Family::Mxw01, CMD_SET_INTENSITY, &[intensity])
}

/// Print request payload: `rows(2 LE) + 0x30 + mode`.
pub fn print_request_payload(rows: u16, mode: u8) -> [u8; 4] {
    let [lo, hi] = rows.to_le_bytes();
    [lo, hi, PRINT_REQUEST_MAGIC, mode]
}

pub fn flush() -> Vec<u8> {
    build_frame(Family::Mxw01, CMD_FLUSH, &[0x00])
}

/// Map a 0..=100 darkness percentage onto the device's intensity byte.
pub fn intensity_byte(percent: u8) -> u8 {
    (u16::from(percent.min(100)) * 0xff / 100) as u8
}
