//! Cat printer control library supporting the GB (legacy) and MXW01 (framed)
//! families.
//!
//! Provides BLE session management, protocol-family detection, notification
//! correlation and the print sequences of both dialects.

pub mod ble;
mod ble_init;
pub mod correlator;
pub mod detect;
pub mod driver;
pub mod options;
pub mod printer;
pub mod protocol;
pub mod session;
pub mod status;
pub mod transport;

// Re-exports for convenience
pub use ble::{BleConnection, BleLink, DiscoveredDevice};
pub use correlator::Correlator;
pub use detect::{Detection, DetectionMethod};
pub use driver::{PrintProgress, PrintState, PrinterDriver};
pub use options::PrintOptions;
pub use printer::CatPrinter;
pub use protocol::{Family, Frame};
pub use session::Session;
pub use status::{PrinterState, PrinterStatus};
pub use transport::{Channel, NotificationStream, Transport};

/// Print width in dots (standard for GB/MXW01 series thermal printers).
pub const PRINT_WIDTH: u16 = 384;

/// Errors that can occur during printer operations.
#[derive(Debug, thiserror::Error)]
pub enum CatPrinterError {
    #[error("Bluetooth transport unavailable: {0}")]
    TransportUnavailable(String),

    #[error("Printer not found during BLE scan")]
    PrinterNotFound,

    #[error("BLE connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Missing {0} characteristic on connected device")]
    MissingCharacteristic(&'static str),

    #[error("BLE write error: {0}")]
    Write(String),

    #[error("BLE scan error: {0}")]
    Scan(String),

    #[error("Not connected to any device")]
    NotConnected,

    #[error("Connection lost")]
    ConnectionLost,

    #[error("No response to command 0x{command:02x} within {timeout_ms} ms")]
    RequestTimeout { command: u8, timeout_ms: u64 },

    #[error("Request for command 0x{0:02x} was replaced by a newer request")]
    RequestSuperseded(u8),

    #[error("Printer reported error code {code}")]
    DeviceError { code: u8 },

    #[error("Printer rejected print request (status {status})")]
    PrintRejected { status: u8 },

    #[error("Invalid image dimensions: expected width {expected}, got {actual}")]
    InvalidImageSize { expected: u16, actual: u32 },

    #[error("Image has {rows} rows, the printer accepts at most {max}")]
    ImageTooTall { rows: usize, max: usize },

    #[error("Invalid raster: {0}")]
    InvalidRaster(#[from] image_processor::RasterError),
}

/// Result type alias for catprinter operations.
pub type Result<T> = std::result::Result<T, CatPrinterError>;
