//! GB print sequence.
//!
//! Everything goes to the control characteristic and the printer never
//! acknowledges, so pacing is purely time based.

use std::time::Duration;

use image_processor::BitImage;
use tracing::{debug, info};

use super::{PrintJob, PrintState, transfer_percent};
use crate::options::PrintOptions;
use crate::protocol::gb;
use crate::session::Session;
use crate::status::PrinterStatus;
use crate::transport::Channel;
use crate::Result;

/// Pause between configuration commands.
pub const COMMAND_DELAY: Duration = Duration::from_millis(50);

/// Pause after every [`ROWS_PER_PAUSE`] rows.
pub const ROW_PAUSE: Duration = Duration::from_millis(20);

pub const ROWS_PER_PAUSE: usize = 4;

#[derive(Debug, Clone, Default)]
pub struct GbDriver;

impl GbDriver {
    /// GB printers have no status query; report a healthy idle device.
    pub async fn status(&self, _session: &Session) -> Result<PrinterStatus> {
        Ok(PrinterStatus::placeholder())
    }

    pub async fn battery(&self, _session: &Session) -> Result<u8> {
        Ok(100)
    }

    pub(crate) async fn print(
        &self,
        session: &Session,
        bitmap: &BitImage,
        options: &PrintOptions,
        mut job: PrintJob<'_, '_>,
    ) -> Result<()> {
        job.enter(PrintState::SettingIntensity, 50);
        let speed = gb::speed_for_intensity(options.intensity);
        let energy = gb::energy_for_intensity(options.intensity);
        debug!(speed, energy, "Configuring print head");

        let setup = [
            gb::start_print(),
            gb::set_dpi(),
            gb::set_speed(speed),
            gb::set_energy(energy),
            gb::apply_energy(),
            gb::lattice_start(),
        ];
        for command in &setup {
            session.send(Channel::Control, command).await?;
            tokio::time::sleep(COMMAND_DELAY).await;
        }

        job.enter(PrintState::TransferringData, 50);
        let total_rows = bitmap.row_count();
        info!(rows = total_rows, "Sending raster rows");
        for (index, row) in bitmap.rows().enumerate() {
            session.send(Channel::Control, &gb::print_row(row)).await?;
            let sent = index + 1;
            if sent % ROWS_PER_PAUSE == 0 {
                tokio::time::sleep(ROW_PAUSE).await;
                job.report(transfer_percent(sent, total_rows));
            }
        }

        job.enter(PrintState::Flushing, 90);
        session.send(Channel::Control, &gb::lattice_end()).await?;
        tokio::time::sleep(COMMAND_DELAY).await;
        session
            .send(Channel::Control, &gb::feed_paper(gb::FEED_LINES))
            .await?;

        info!("Print job sent");
        job.finish();
        Ok(())
    }
}
