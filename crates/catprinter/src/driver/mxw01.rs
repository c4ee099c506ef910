//! MXW01 print sequence.
//!
//! Commands go to the control characteristic, raster rows to the data
//! characteristic. The job is:
//! set intensity -> status check -> print request (acked) -> rows -> flush
//! -> wait for the print-complete notification.

use std::time::Duration;

use image_processor::BitImage;
use tracing::{debug, info, warn};

use super::{PrintJob, PrintState, transfer_percent};
use crate::options::PrintOptions;
use crate::protocol::mxw01::{
    self, CMD_GET_BATTERY, CMD_GET_STATUS, CMD_PRINT_COMPLETE, CMD_PRINT_REQUEST,
};
use crate::protocol::Family;
use crate::session::Session;
use crate::status::PrinterStatus;
use crate::transport::Channel;
use crate::{CatPrinterError, Result};

/// Timeout for status, battery and print-request replies.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to wait for the print-complete notification after flushing.
pub const COMPLETION_TIMEOUT: Duration = Duration::from_secs(20);

/// Pause after each data chunk so the printer's buffer keeps up.
pub const CHUNK_DELAY: Duration = Duration::from_millis(15);

#[derive(Debug, Clone, Default)]
pub struct Mxw01Driver;

impl Mxw01Driver {
    pub async fn status(&self, session: &Session) -> Result<PrinterStatus> {
        let frame = session
            .request(Family::Mxw01, CMD_GET_STATUS, &[0x00], RESPONSE_TIMEOUT)
            .await?;
        let status = PrinterStatus::parse(&frame.payload);
        debug!(?status, "Status received");
        Ok(status)
    }

    pub async fn battery(&self, session: &Session) -> Result<u8> {
        let frame = session
            .request(Family::Mxw01, CMD_GET_BATTERY, &[0x00], RESPONSE_TIMEOUT)
            .await?;
        // Short payloads carry no level; report empty rather than guess.
        Ok(frame.payload.first().copied().unwrap_or(0))
    }

    pub(crate) async fn print(
        &self,
        session: &Session,
        bitmap: &BitImage,
        options: &PrintOptions,
        mut job: PrintJob<'_, '_>,
    ) -> Result<()> {
        let total_rows = bitmap.row_count();
        let rows = u16::try_from(total_rows).map_err(|_| CatPrinterError::ImageTooTall {
            rows: total_rows,
            max: usize::from(u16::MAX),
        })?;

        job.enter(PrintState::SettingIntensity, 50);
        let intensity = mxw01::intensity_byte(options.intensity);
        session
            .send(Channel::Control, &mxw01::set_intensity(intensity))
            .await?;

        job.enter(PrintState::CheckingStatus, 50);
        let status = self.status(session).await?;
        if let Some(code) = status.error_code {
            warn!(code, "Printer reported an error, aborting job");
            return Err(CatPrinterError::DeviceError { code });
        }

        job.enter(PrintState::RequestingPrint, 50);
        let payload = mxw01::print_request_payload(rows, options.mode);
        let ack = session
            .request(Family::Mxw01, CMD_PRINT_REQUEST, &payload, RESPONSE_TIMEOUT)
            .await?;
        match ack.payload.first() {
            Some(0x00) => {}
            other => {
                let status = other.copied().unwrap_or(0xff);
                warn!(status, "Print request rejected");
                return Err(CatPrinterError::PrintRejected { status });
            }
        }

        job.enter(PrintState::TransferringData, 50);
        info!(rows, bytes = bitmap.as_bytes().len(), "Sending raster");
        for (index, chunk) in bitmap.rows().enumerate() {
            session.send(Channel::Data, chunk).await?;
            tokio::time::sleep(CHUNK_DELAY).await;
            job.report(transfer_percent(index + 1, total_rows));
        }

        job.enter(PrintState::Flushing, 90);
        // Register first: the completion can arrive before the flush write returns.
        let completion = session.correlator().register(CMD_PRINT_COMPLETE);
        if let Err(err) = session.send(Channel::Control, &mxw01::flush()).await {
            completion.cancel();
            return Err(err);
        }

        job.enter(PrintState::AwaitingCompletion, 90);
        match completion.wait(COMPLETION_TIMEOUT).await {
            Ok(_) => info!("Print complete"),
            Err(CatPrinterError::RequestTimeout { .. }) => {
                warn!("No print-complete notification, assuming the job finished");
            }
            Err(err) => return Err(err),
        }

        job.finish();
        Ok(())
    }
}
