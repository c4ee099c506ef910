//! GB series (legacy family) command set.
//!
//! Magic bytes: 0x51, 0x78
//! Everything, image rows included, is written to the control characteristic
//! (AE01). The device never acknowledges configuration writes.

use super::{Family, build_frame};

/// GB series protocol magic bytes.
pub const MAGIC: [u8; 2] = [0x51, 0x78];

// -- Command IDs --
pub const CMD_FEED_PAPER: u8 = 0xa1;
pub const CMD_PRINT_ROW: u8 = 0xa2;
pub const CMD_START_PRINT: u8 = 0xa3;
pub const CMD_SET_DPI: u8 = 0xa4;
pub const CMD_LATTICE: u8 = 0xa6;
pub const CMD_SET_ENERGY: u8 = 0xaf;
pub const CMD_SET_SPEED: u8 = 0xbd;
pub const CMD_APPLY_ENERGY: u8 = 0xbe;

/// 200 DPI.
const DPI_200: u8 = 0x32;

const LATTICE_START: [u8; 11] = [0xaa, 0x55, 0x17, 0x38, 0x44, 0x5f, 0x5f, 0x5f, 0x44, 0x38, 0x2c];
const LATTICE_END: [u8; 11] = [0xaa, 0x55, 0x17, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x17];

/// Motor speed range; higher is slower and darker.
const SPEED_FAST: u8 = 0x10;
const SPEED_SLOW: u8 = 0x30;

/// Heater energy range.
const ENERGY_MIN: u16 = 0x1000;
const ENERGY_MAX: u16 = 0xdfff;

/// Lines fed after the image so the print clears the tear bar.
pub const FEED_LINES: u16 = 0x30;

/// Start-print, doubling as the family's status probe.
pub fn start_print() -> Vec<u8> {
    build_frame(Family::Gb, CMD_START_PRINT, &[0x00])
}

pub fn set_dpi() -> Vec<u8> {
    build_frame(Family::Gb, CMD_SET_DPI, &[DPI_200])
}

pub fn set_speed(speed: u8) -> Vec<u8> {
    build_frame(Family::Gb, CMD_SET_SPEED, &[speed])
}

pub fn set_energy(energy: u16) -> Vec<u8> {
    build_frame(Family::Gb, CMD_SET_ENERGY, &energy.to_le_bytes())
}

pub fn apply_energy() -> Vec<u8> {
    build_frame(Family::Gb, CMD_APPLY_ENERGY, &[0x01])
}

pub fn lattice_start() -> Vec<u8> {
    build_frame(Family::Gb, CMD_LATTICE, &LATTICE_START)
}

pub fn lattice_end() -> Vec<u8> {
    build_frame(Family::Gb, CMD_LATTICE, &LATTICE_END)
}

/// One packed 1bpp row.
pub fn print_row(row: &[u8]) -> Vec<u8> {
    build_frame(Family::Gb, CMD_PRINT_ROW, row)
}

pub fn feed_paper(lines: u16) -> Vec<u8> {
    build_frame(Family::Gb, CMD_FEED_PAPER, &lines.to_le_bytes())
}

/// Darker prints need a slower motor so the head stays on each line longer.
pub fn speed_for_intensity(percent: u8) -> u8 {
    let percent = u16::from(percent.min(100));
    SPEED_FAST + (u16::from(SPEED_SLOW - SPEED_FAST) * percent / 100) as u8
}

pub fn energy_for_intensity(percent: u8) -> u16 {
    let percent = u32::from(percent.min(100));
    ENERGY_MIN + ((u32::from(ENERGY_MAX - ENERGY_MIN) * percent) / 100) as u16
}
