//! BLE connection management using btleplug.
//!
//! Provides scanning (both advertised service UUIDs), connecting and
//! characteristic discovery, and a [`Transport`] implementation over the
//! connected peripheral.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{
    Central, CentralEvent, CharPropFlags, Characteristic, Peripheral as _, ScanFilter, WriteType,
};
use btleplug::platform::{Adapter, Peripheral};
use futures::StreamExt;
use uuid::Uuid;

use crate::ble_init;
use crate::detect::is_known_model_name;
use crate::protocol::{CHAR_CONTROL, CHAR_DATA, CHAR_NOTIFY, SERVICE_UUID, SERVICE_UUID_MACOS};
use crate::transport::{Channel, NotificationStream, Transport};
use crate::{CatPrinterError, Result};

/// Default BLE scan timeout.
pub const SCAN_TIMEOUT: Duration = Duration::from_secs(10);

/// Discovered BLE device information.
#[derive(Debug, Clone)]
pub struct DiscoveredDevice {
    /// Device display name (may be empty if not advertised).
    pub name: String,
    /// Platform-specific device identifier (address on Linux, UUID on macOS).
    pub id: String,
    /// The underlying btleplug peripheral handle.
    pub peripheral: Peripheral,
}

/// Owns the BLE adapter used to find printers.
pub struct BleConnection {
    adapter: Adapter,
}

impl BleConnection {
    /// Initialize the platform BLE adapter (first available).
    ///
    /// Fails with [`CatPrinterError::TransportUnavailable`] when the host has
    /// no usable Bluetooth stack.
    pub async fn new() -> Result<Self> {
        let adapter = ble_init::first_adapter().await?;
        Ok(Self { adapter })
    }

    /// Scan for printers for the whole `timeout` window.
    pub async fn scan_devices(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        self.scan_until(timeout, |_| false).await
    }

    /// Scan until a device matching `target` (id, address or name) shows up.
    /// An empty target accepts the first printer found.
    pub async fn find_device(&self, target: &str, timeout: Duration) -> Result<DiscoveredDevice> {
        let target = target.trim();
        let devices = self
            .scan_until(timeout, |d| target.is_empty() || device_matches_target(&d.id, &d.name, target))
            .await?;
        devices
            .into_iter()
            .find(|d| target.is_empty() || device_matches_target(&d.id, &d.name, target))
            .ok_or(CatPrinterError::PrinterNotFound)
    }

    async fn scan_until(
        &self,
        timeout: Duration,
        stop: impl Fn(&DiscoveredDevice) -> bool,
    ) -> Result<Vec<DiscoveredDevice>> {
        tracing::info!(timeout_secs = timeout.as_secs(), "Starting BLE scan");

        // Listen before scanning so early advertisements are not lost.
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| CatPrinterError::Scan(e.to_string()))?;

        self.adapter
            .start_scan(ScanFilter::default())
            .await
            .map_err(|e| CatPrinterError::Scan(e.to_string()))?;

        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);

        let mut found = Vec::new();
        let mut seen_ids = HashSet::new();

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                event = events.next() => {
                    let Some(event) = event else { break };
                    let id = match event {
                        CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => id,
                        _ => continue,
                    };
                    let id_str = id.to_string();
                    if seen_ids.contains(&id_str) {
                        continue;
                    }
                    let Ok(peripheral) = self.adapter.peripheral(&id).await else { continue };
                    let Ok(Some(props)) = peripheral.properties().await else { continue };

                    let name = props.local_name.unwrap_or_default();
                    if !is_printer(&props.services, &name) {
                        continue;
                    }

                    tracing::info!(name = %name, id = %id_str, "Found printer");
                    seen_ids.insert(id_str.clone());
                    let device = DiscoveredDevice { name, id: id_str, peripheral };
                    let done = stop(&device);
                    found.push(device);
                    if done {
                        break;
                    }
                }
            }
        }

        self.adapter
            .stop_scan()
            .await
            .map_err(|e| CatPrinterError::Scan(e.to_string()))?;

        tracing::info!(count = found.len(), "BLE scan complete");
        Ok(found)
    }

    /// Connect to a peripheral and discover the printer characteristics.
    pub async fn connect(&self, device: &DiscoveredDevice) -> Result<BleLink> {
        tracing::info!(id = %device.id, name = %device.name, "Connecting to device");
        let peripheral = device.peripheral.clone();

        peripheral
            .connect()
            .await
            .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))?;

        // The OS keeps the link up after the handle is dropped, so close it
        // before reporting a discovery failure.
        let (control, notify, data) = match discover_characteristics(&peripheral).await {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(id = %device.id, error = %err, "Discovery failed, disconnecting");
                if let Err(e) = peripheral.disconnect().await {
                    tracing::warn!(error = %e, "Failed to disconnect after discovery error");
                }
                return Err(err);
            }
        };

        tracing::info!(has_data_channel = data.is_some(), "Connected and discovered characteristics");
        Ok(BleLink {
            adapter: self.adapter.clone(),
            peripheral,
            name: device.name.clone(),
            control,
            notify,
            data,
            connected: Arc::new(AtomicBool::new(true)),
        })
    }
}

/// Find the control, notify and (optional) data characteristics.
async fn discover_characteristics(
    peripheral: &Peripheral,
) -> Result<(Characteristic, Characteristic, Option<Characteristic>)> {
    peripheral
        .discover_services()
        .await
        .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))?;

    let characteristics = peripheral.characteristics();
    let find = |uuid: Uuid| characteristics.iter().find(|c| c.uuid == uuid).cloned();

    let control = find(CHAR_CONTROL).ok_or(CatPrinterError::MissingCharacteristic("control"))?;
    let notify = find(CHAR_NOTIFY).ok_or(CatPrinterError::MissingCharacteristic("notify"))?;
    Ok((control, notify, find(CHAR_DATA)))
}

/// A connected printer peripheral.
pub struct BleLink {
    adapter: Adapter,
    peripheral: Peripheral,
    name: String,
    control: Characteristic,
    notify: Characteristic,
    data: Option<Characteristic>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl Transport for BleLink {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn has_data_channel(&self) -> bool {
        self.data.is_some()
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn write(&self, channel: Channel, data: &[u8]) -> Result<()> {
        if !self.is_connected() {
            return Err(CatPrinterError::ConnectionLost);
        }
        let (characteristic, write_type) = match channel {
            Channel::Control => {
                let write_type = if self
                    .control
                    .properties
                    .contains(CharPropFlags::WRITE_WITHOUT_RESPONSE)
                {
                    WriteType::WithoutResponse
                } else {
                    WriteType::WithResponse
                };
                (&self.control, write_type)
            }
            Channel::Data => {
                let data_char = self
                    .data
                    .as_ref()
                    .ok_or(CatPrinterError::MissingCharacteristic("data"))?;
                (data_char, WriteType::WithoutResponse)
            }
        };

        self.peripheral
            .write(characteristic, data, write_type)
            .await
            .map_err(|e| {
                if self.is_connected() {
                    CatPrinterError::Write(format!("{channel:?} ({} bytes): {e}", data.len()))
                } else {
                    CatPrinterError::ConnectionLost
                }
            })
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        self.peripheral
            .subscribe(&self.notify)
            .await
            .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))?;

        let notify_uuid = self.notify.uuid;
        let values = self
            .peripheral
            .notifications()
            .await
            .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))?
            .filter(move |n| futures::future::ready(n.uuid == notify_uuid))
            .map(|n| n.value);

        // End the stream when the adapter reports this peripheral gone, so
        // waiters fail with ConnectionLost instead of hanging.
        let mut events = self
            .adapter
            .events()
            .await
            .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))?;
        let id = self.peripheral.id();
        let connected = Arc::clone(&self.connected);
        let disconnected = async move {
            while let Some(event) = events.next().await {
                if matches!(event, CentralEvent::DeviceDisconnected(ref gone) if *gone == id) {
                    break;
                }
            }
            connected.store(false, Ordering::SeqCst);
            tracing::warn!("Printer disconnected");
        };

        Ok(Box::pin(values.take_until(disconnected)))
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        tracing::info!(name = %self.name, "Disconnecting BLE device");
        self.peripheral
            .disconnect()
            .await
            .map_err(|e| CatPrinterError::ConnectionFailed(e.to_string()))
    }
}

/// Printers advertise either service UUID; some only advertise a name.
fn is_printer(services: &[Uuid], name: &str) -> bool {
    services.contains(&SERVICE_UUID) || services.contains(&SERVICE_UUID_MACOS) || is_known_model_name(name)
}

pub fn normalize_device_id(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn device_matches_target(device_id: &str, device_name: &str, target: &str) -> bool {
    let normalized_target = normalize_device_id(target);
    device_id.eq_ignore_ascii_case(target)
        || normalize_device_id(device_id) == normalized_target
        || (!device_name.is_empty() && device_name.eq_ignore_ascii_case(target))
}
