//! High-level printer handle.

use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use image_processor::BitImage;
use tracing::{info, warn};

use crate::ble::{BleConnection, DiscoveredDevice, SCAN_TIMEOUT};
use crate::detect::{self, Detection};
use crate::driver::{PrintProgress, PrintState, PrinterDriver};
use crate::options::PrintOptions;
use crate::protocol::Family;
use crate::session::Session;
use crate::status::PrinterStatus;
use crate::transport::Transport;
use crate::{CatPrinterError, PRINT_WIDTH, Result};

struct Connection {
    session: Session,
    driver: PrinterDriver,
}

/// A cat printer of either family.
///
/// Connect with [`CatPrinter::connect`] (BLE) or [`CatPrinter::attach`] (any
/// [`Transport`]); the family is detected once per connection.
pub struct CatPrinter {
    connection: Option<Connection>,
    scan_timeout: Duration,
    probe_window: Duration,
}

impl Default for CatPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl CatPrinter {
    pub fn new() -> Self {
        Self {
            connection: None,
            scan_timeout: SCAN_TIMEOUT,
            probe_window: detect::PROBE_WINDOW,
        }
    }

    /// Builder: set how long [`CatPrinter::connect`] scans.
    pub fn with_scan_timeout(mut self, timeout: Duration) -> Self {
        self.scan_timeout = timeout;
        self
    }

    /// Builder: set how long detection waits for a probe reply.
    pub fn with_probe_window(mut self, window: Duration) -> Self {
        self.probe_window = window;
        self
    }

    /// List nearby printers.
    pub async fn scan(timeout: Duration) -> Result<Vec<DiscoveredDevice>> {
        BleConnection::new().await?.scan_devices(timeout).await
    }

    /// Scan for `target` (address, id or name; empty = first printer), connect
    /// and detect its family.
    pub async fn connect(&mut self, target: &str) -> Result<Family> {
        let ble = BleConnection::new().await?;
        let device = ble.find_device(target, self.scan_timeout).await?;
        let link = ble.connect(&device).await?;
        self.attach(Arc::new(link)).await
    }

    /// Use an already connected transport. Any previous connection is closed.
    pub async fn attach(&mut self, transport: Arc<dyn Transport>) -> Result<Family> {
        if self.connection.is_some() {
            self.disconnect().await?;
        }

        let session = match Session::open(Arc::clone(&transport)).await {
            Ok(session) => session,
            Err(err) => {
                if let Err(close_err) = transport.disconnect().await {
                    warn!(error = %close_err, "Failed to disconnect after session setup error");
                }
                return Err(err);
            }
        };
        let detected = detect::detect_with_window(&session, self.probe_window).await;
        let Detection { family, .. } = match detected {
            Ok(detection) => detection,
            Err(err) => {
                if let Err(close_err) = session.close().await {
                    warn!(error = %close_err, "Failed to close session after detection error");
                }
                return Err(err);
            }
        };

        self.connection = Some(Connection {
            session,
            driver: PrinterDriver::for_family(family),
        });
        Ok(family)
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        match self.connection.take() {
            Some(connection) => connection.session.close().await,
            None => Ok(()),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection
            .as_ref()
            .is_some_and(|c| c.session.is_connected())
    }

    /// Family detected for the current connection.
    pub fn family(&self) -> Option<Family> {
        self.connection.as_ref().map(|c| c.driver.family())
    }

    fn connection(&self) -> Result<&Connection> {
        self.connection.as_ref().ok_or(CatPrinterError::NotConnected)
    }

    pub async fn get_status(&self) -> Result<PrinterStatus> {
        let connection = self.connection()?;
        connection.driver.status(&connection.session).await
    }

    pub async fn get_battery_level(&self) -> Result<u8> {
        let connection = self.connection()?;
        connection.driver.battery(&connection.session).await
    }

    /// Print a raster that is exactly [`PRINT_WIDTH`] pixels wide.
    pub async fn print_image(&mut self, raster: &RgbaImage, options: &PrintOptions) -> Result<()> {
        self.print_image_with_progress(raster, options, |_| {}).await
    }

    /// Like [`CatPrinter::print_image`], reporting progress as the job runs.
    pub async fn print_image_with_progress(
        &mut self,
        raster: &RgbaImage,
        options: &PrintOptions,
        mut progress: impl FnMut(PrintProgress) + Send,
    ) -> Result<()> {
        if raster.width() != u32::from(PRINT_WIDTH) {
            return Err(CatPrinterError::InvalidImageSize {
                expected: PRINT_WIDTH,
                actual: raster.width(),
            });
        }
        self.connection()?;

        progress(PrintProgress {
            state: PrintState::Encoding,
            percent: 0,
        });
        let bitmap = image_processor::encode(raster, &options.encode_options())?;
        info!(
            rows = bitmap.row_count(),
            content_rows = bitmap.content_rows(),
            dither = %options.dither,
            "Raster encoded"
        );
        progress(PrintProgress {
            state: PrintState::Encoding,
            percent: 50,
        });

        self.print_bitmap_with_progress(&bitmap, options, &mut progress).await
    }

    /// Print an already encoded bitmap.
    pub async fn print_bitmap(&mut self, bitmap: &BitImage, options: &PrintOptions) -> Result<()> {
        self.print_bitmap_with_progress(bitmap, options, &mut |_: PrintProgress| {})
            .await
    }

    async fn print_bitmap_with_progress(
        &mut self,
        bitmap: &BitImage,
        options: &PrintOptions,
        progress: &mut (dyn FnMut(PrintProgress) + Send),
    ) -> Result<()> {
        if bitmap.width() != u32::from(PRINT_WIDTH) {
            return Err(CatPrinterError::InvalidImageSize {
                expected: PRINT_WIDTH,
                actual: bitmap.width(),
            });
        }
        let connection = self.connection()?;
        connection
            .driver
            .print(&connection.session, bitmap, options, progress)
            .await
    }
}
