//! Transport abstraction over the printer's GATT characteristics.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::Result;

/// Raw notification payloads, in arrival order. Ends when the link drops.
pub type NotificationStream = Pin<Box<dyn Stream<Item = Vec<u8>> + Send>>;

/// Writable characteristic of the printer service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// AE01: command frames.
    Control,
    /// AE03: bulk bitmap data, written without response (MXW01 only).
    Data,
}

/// A connected printer link.
///
/// Implemented by [`crate::ble::BleLink`] for real hardware; tests supply an
/// in-memory implementation.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Advertised device name (may be empty).
    fn device_name(&self) -> &str;

    /// Whether the data characteristic was discovered on this device.
    fn has_data_channel(&self) -> bool;

    fn is_connected(&self) -> bool;

    /// Write one buffer to the given characteristic.
    async fn write(&self, channel: Channel, data: &[u8]) -> Result<()>;

    /// Subscribe to the notify characteristic.
    async fn notifications(&self) -> Result<NotificationStream>;

    async fn disconnect(&self) -> Result<()>;
}
