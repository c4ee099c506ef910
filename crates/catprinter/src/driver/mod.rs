//! Per-family print sequences.
//!
//! The detected [`Family`] selects a driver once per connection; callers go
//! through [`PrinterDriver`] without knowing which dialect is in use.

pub mod gb;
pub mod mxw01;

use std::fmt;

use image_processor::BitImage;
use tracing::debug;

use crate::options::PrintOptions;
use crate::protocol::Family;
use crate::session::Session;
use crate::status::PrinterStatus;
use crate::Result;

pub use gb::GbDriver;
pub use mxw01::Mxw01Driver;

/// Phase of a print job. Jobs run strictly in declaration order; GB jobs skip
/// the phases their dialect has no command for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrintState {
    Idle,
    Encoding,
    SettingIntensity,
    CheckingStatus,
    RequestingPrint,
    TransferringData,
    Flushing,
    AwaitingCompletion,
}

impl PrintState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Encoding => "encoding",
            Self::SettingIntensity => "setting-intensity",
            Self::CheckingStatus => "checking-status",
            Self::RequestingPrint => "requesting-print",
            Self::TransferringData => "transferring-data",
            Self::Flushing => "flushing",
            Self::AwaitingCompletion => "awaiting-completion",
        }
    }
}

impl fmt::Display for PrintState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress report handed to the caller's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrintProgress {
    pub state: PrintState,
    /// 0..=100. Encoding covers 0..=50, transfer 50..=90.
    pub percent: u8,
}

/// Callback type for progress reports.
pub type ProgressFn<'a> = dyn FnMut(PrintProgress) + Send + 'a;

/// Tracks the phase of one job and reports it.
pub(crate) struct PrintJob<'a, 'p> {
    family: Family,
    state: PrintState,
    progress: &'a mut ProgressFn<'p>,
}

impl<'a, 'p> PrintJob<'a, 'p> {
    pub(crate) fn new(family: Family, progress: &'a mut ProgressFn<'p>) -> Self {
        Self {
            family,
            state: PrintState::Idle,
            progress,
        }
    }

    pub(crate) fn enter(&mut self, next: PrintState, percent: u8) {
        debug!(family = %self.family, from = %self.state, to = %next, "Print state");
        self.state = next;
        self.report(percent);
    }

    pub(crate) fn report(&mut self, percent: u8) {
        (self.progress)(PrintProgress {
            state: self.state,
            percent,
        });
    }

    pub(crate) fn finish(mut self) {
        self.enter(PrintState::Idle, 100);
    }
}

/// Progress within the transfer phase, 50..=90.
pub(crate) fn transfer_percent(sent: usize, total: usize) -> u8 {
    if total == 0 {
        return 90;
    }
    (50 + sent.min(total) * 40 / total) as u8
}

/// Family-specific command sequences.
#[derive(Debug, Clone)]
pub enum PrinterDriver {
    Mxw01(Mxw01Driver),
    Gb(GbDriver),
}

impl PrinterDriver {
    pub fn for_family(family: Family) -> Self {
        match family {
            Family::Mxw01 => Self::Mxw01(Mxw01Driver::default()),
            Family::Gb => Self::Gb(GbDriver::default()),
        }
    }

    pub fn family(&self) -> Family {
        match self {
            Self::Mxw01(_) => Family::Mxw01,
            Self::Gb(_) => Family::Gb,
        }
    }

    pub async fn status(&self, session: &Session) -> Result<PrinterStatus> {
        match self {
            Self::Mxw01(driver) => driver.status(session).await,
            Self::Gb(driver) => driver.status(session).await,
        }
    }

    pub async fn battery(&self, session: &Session) -> Result<u8> {
        match self {
            Self::Mxw01(driver) => driver.battery(session).await,
            Self::Gb(driver) => driver.battery(session).await,
        }
    }

    /// Run a complete job for an already encoded bitmap.
    pub async fn print(
        &self,
        session: &Session,
        bitmap: &BitImage,
        options: &PrintOptions,
        progress: &mut ProgressFn<'_>,
    ) -> Result<()> {
        let job = PrintJob::new(self.family(), progress);
        match self {
            Self::Mxw01(driver) => driver.print(session, bitmap, options, job).await,
            Self::Gb(driver) => driver.print(session, bitmap, options, job).await,
        }
    }
}
