//! Printer protocol definitions.
//!
//! Both families share one frame layout and only differ in magic bytes:
//! `MAGIC(2) + cmd + 0x00 + len(2 LE) + payload + crc8(payload) + 0xFF`.
//! - GB series (magic bytes: 0x51, 0x78) - legacy cat printers
//! - MXW01 series (magic bytes: 0x22, 0x21) - newer framed protocol

pub mod gb;
pub mod mxw01;

use std::fmt;

use tracing::debug;

/// BLE service UUID (standard).
pub const SERVICE_UUID: uuid::Uuid = uuid::Uuid::from_u128(0x0000_ae30_0000_1000_8000_00805f9b34fb);

/// BLE service UUID advertised to macOS scanners.
pub const SERVICE_UUID_MACOS: uuid::Uuid =
    uuid::Uuid::from_u128(0x0000_af30_0000_1000_8000_00805f9b34fb);

/// Control characteristic (AE01), write-only command channel.
pub const CHAR_CONTROL: uuid::Uuid = uuid::Uuid::from_u128(0x0000_ae01_0000_1000_8000_00805f9b34fb);

/// Notify characteristic (AE02), device responses.
pub const CHAR_NOTIFY: uuid::Uuid = uuid::Uuid::from_u128(0x0000_ae02_0000_1000_8000_00805f9b34fb);

/// Data characteristic (AE03), bulk bitmap transfer (MXW01 only).
pub const CHAR_DATA: uuid::Uuid = uuid::Uuid::from_u128(0x0000_ae03_0000_1000_8000_00805f9b34fb);

/// Header length: magic(2) + cmd + reserved + len(2).
const HEADER_LEN: usize = 6;

/// Frame terminator byte.
const TERMINATOR: u8 = 0xff;

/// CRC8 lookup table (polynomial 0x07, init 0x00).
#[rustfmt::skip]
const CRC8_TABLE: [u8; 256] = [
    0,   7,  14,   9,  28,  27,  18,  21,  56,  63,  54,  49,  36,  35,  42,  45,
  112, 119, 126, 121, 108, 107,  98, 101,  72,  79,  70,  65,  84,  83,  90,  93,
  224, 231, 238, 233, 252, 251, 242, 245, 216, 223, 214, 209, 196, 195, 202, 205,
  144, 151, 158, 153, 140, 139, 130, 133, 168, 175, 166, 161, 180, 179, 186, 189,
  199, 192, 201, 206, 219, 220, 213, 210, 255, 248, 241, 246, 227, 228, 237, 234,
  183, 176, 185, 190, 171, 172, 165, 162, 143, 136, 129, 134, 147, 148, 157, 154,
   39,  32,  41,  46,  59,  60,  53,  50,  31,  24,  17,  22,   3,   4,  13,  10,
   87,  80,  89,  94,  75,  76,  69,  66, 111, 104,  97, 102, 115, 116, 125, 122,
  137, 142, 135, 128, 149, 146, 155, 156, 177, 182, 191, 184, 173, 170, 163, 164,
  249, 254, 247, 240, 229, 226, 235, 236, 193, 198, 207, 200, 221, 218, 211, 212,
  105, 110, 103,  96, 117, 114, 123, 124,  81,  86,  95,  88,  77,  74,  67,  68,
   25,  30,  23,  16,   5,   2,  11,  12,  33,  38,  47,  40,  61,  58,  51,  52,
   78,  73,  64,  71,  82,  85,  92,  91, 118, 113, 120, 127, 106, 109, 100,  99,
   62,  57,  48,  55,  34,  37,  44,  43,   6,   1,   8,  15,  26,  29,  20,  19,
  174, 169, 160, 167, 178, 181, 188, 187, 150, 145, 152, 159, 138, 141, 132, 131,
  222, 217, 208, 215, 194, 197, 204, 203, 230, 225, 232, 239, 250, 253, 244, 243,
];

/// Compute CRC8 checksum over a byte slice.
pub fn crc8(data: &[u8]) -> u8 {
    data.iter().fold(0u8, |crc, &b| CRC8_TABLE[(crc ^ b) as usize])
}

/// Printer protocol dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// Legacy GB-style printers: fire-and-forget writes on the control channel.
    Gb,
    /// MXW01-style printers: acknowledged requests plus a bulk data channel.
    Mxw01,
}

impl Family {
    pub const ALL: [Family; 2] = [Family::Mxw01, Family::Gb];

    pub fn magic(&self) -> [u8; 2] {
        match self {
            Family::Gb => gb::MAGIC,
            Family::Mxw01 => mxw01::MAGIC,
        }
    }

    pub fn from_magic(magic: [u8; 2]) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.magic() == magic)
    }

    /// Human-readable protocol name (e.g. "GB", "MXW01").
    pub fn name(&self) -> &'static str {
        match self {
            Family::Gb => "GB",
            Family::Mxw01 => "MXW01",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A decoded command or notification frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub family: Family,
    pub command: u8,
    pub reserved: u8,
    pub payload: Vec<u8>,
    /// Trailing checksum byte, if the notification carried one.
    pub crc: Option<u8>,
}

impl Frame {
    pub fn new(family: Family, command: u8, payload: impl Into<Vec<u8>>) -> Self {
        let payload = payload.into();
        let crc = Some(crc8(&payload));
        Self {
            family,
            command,
            reserved: 0,
            payload,
            crc,
        }
    }
}

/// Largest payload a frame's 16-bit length field can describe.
pub const MAX_PAYLOAD_LEN: usize = u16::MAX as usize;

/// Build a raw command frame for the given family.
///
/// Payloads longer than [`MAX_PAYLOAD_LEN`] are a caller bug: debug builds
/// panic, release builds cut the payload so the length field still matches.
pub fn build_frame(family: Family, cmd: u8, payload: &[u8]) -> Vec<u8> {
    debug_assert!(
        payload.len() <= MAX_PAYLOAD_LEN,
        "frame payload of {} bytes exceeds the 16-bit length field",
        payload.len()
    );
    let len = u16::try_from(payload.len()).unwrap_or(u16::MAX);
    let payload = &payload[..usize::from(len)];
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len() + 2);
    buf.extend_from_slice(&family.magic());
    buf.push(cmd);
    buf.push(0x00);
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(payload);
    buf.push(crc8(payload));
    buf.push(TERMINATOR);
    buf
}

/// Parse a notification.
///
/// Returns `None` for buffers shorter than a header or with unknown magic;
/// those belong to some other protocol and are not errors. The declared
/// length is trusted but clamped to the bytes actually received, and neither
/// the terminator nor the checksum is enforced.
pub fn parse_frame(data: &[u8]) -> Option<Frame> {
    if data.len() < HEADER_LEN {
        return None;
    }
    let family = Family::from_magic([data[0], data[1]])?;
    let declared = u16::from_le_bytes([data[4], data[5]]) as usize;
    let end = (HEADER_LEN + declared).min(data.len());
    if end - HEADER_LEN < declared {
        debug!(family = %family, declared, received = end - HEADER_LEN, "Truncated notification payload");
    }
    let payload = data[HEADER_LEN..end].to_vec();
    let crc = data.get(HEADER_LEN + declared).copied();
    if let Some(received) = crc {
        let expected = crc8(&payload);
        if received != expected {
            debug!(family = %family, command = data[2], received, expected, "CRC mismatch in notification");
        }
    }
    Some(Frame {
        family,
        command: data[2],
        reserved: data[3],
        payload,
        crc,
    })
}
