//! BLE adapter initialization with retries (macOS CentralManager warm-up).

use std::time::Duration;

use btleplug::api::Manager as _;
use btleplug::platform::{Adapter, Manager};

use crate::{CatPrinterError, Result};

pub(crate) const RETRY_COUNT: usize = 6;
pub(crate) const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Open the first available adapter, retrying while CoreBluetooth powers up.
pub(crate) async fn first_adapter() -> Result<Adapter> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match try_first_adapter().await {
            Ok(adapter) => return Ok(adapter),
            Err(err) if attempt < RETRY_COUNT && is_central_manager_transient(&err) => {
                tracing::debug!(attempt, "BLE central manager not ready, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
            Err(err) => return Err(wrap_ble_init_error(err)),
        }
    }
}

async fn try_first_adapter() -> Result<Adapter> {
    let manager = Manager::new()
        .await
        .map_err(|e| CatPrinterError::TransportUnavailable(e.to_string()))?;

    let adapters = manager
        .adapters()
        .await
        .map_err(|e| CatPrinterError::TransportUnavailable(e.to_string()))?;

    adapters
        .into_iter()
        .next()
        .ok_or_else(|| CatPrinterError::TransportUnavailable("No BLE adapter found".into()))
}

pub(crate) fn is_central_manager_transient(err: &CatPrinterError) -> bool {
    #[cfg(target_os = "macos")]
    {
        if let CatPrinterError::TransportUnavailable(msg) = err {
            let msg = msg.to_ascii_lowercase();
            return msg.contains("central manager has invalid state") && msg.contains("have=0");
        }
    }
    let _ = err;

    false
}

pub(crate) fn wrap_ble_init_error(err: CatPrinterError) -> CatPrinterError {
    #[cfg(target_os = "macos")]
    {
        if let CatPrinterError::TransportUnavailable(msg) = &err {
            if msg
                .to_ascii_lowercase()
                .contains("central manager has invalid state")
            {
                return CatPrinterError::TransportUnavailable(format!(
                    "{msg} (macOS: turn Bluetooth on and allow this app under System Settings > Privacy & Security > Bluetooth)"
                ));
            }
        }
    }

    err
}
