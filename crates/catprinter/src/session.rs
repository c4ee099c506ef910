//! One physical connection to one printer.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::correlator::Correlator;
use crate::protocol::{Family, Frame, build_frame};
use crate::transport::{Channel, Transport};
use crate::Result;

/// Owns the transport, the notification pump and the correlation table of a
/// single connection.
///
/// A session is driven by one caller at a time; nothing here serializes
/// concurrent print jobs.
pub struct Session {
    transport: Arc<dyn Transport>,
    correlator: Correlator,
    pump: JoinHandle<()>,
}

impl Session {
    /// Subscribe to notifications and start routing them.
    pub async fn open(transport: Arc<dyn Transport>) -> Result<Self> {
        let correlator = Correlator::new();
        let stream = transport.notifications().await?;
        let pump = correlator.spawn_pump(stream);
        info!(device = %transport.device_name(), "Session opened");
        Ok(Self {
            transport,
            correlator,
            pump,
        })
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    pub fn correlator(&self) -> &Correlator {
        &self.correlator
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected() && !self.correlator.is_closed()
    }

    /// Write raw bytes to a characteristic.
    pub async fn send(&self, channel: Channel, bytes: &[u8]) -> Result<()> {
        self.transport.write(channel, bytes).await
    }

    /// Write a command frame on the control channel without awaiting a reply.
    pub async fn send_command(&self, family: Family, command: u8, payload: &[u8]) -> Result<()> {
        debug!(family = %family, command, len = payload.len(), "Sending command");
        self.send(Channel::Control, &build_frame(family, command, payload)).await
    }

    /// Write a command and wait for the notification with the same id.
    pub async fn request(
        &self,
        family: Family,
        command: u8,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Frame> {
        let pending = self.correlator.register(command);
        if let Err(err) = self.send_command(family, command, payload).await {
            pending.cancel();
            return Err(err);
        }
        pending.wait(timeout).await
    }

    /// Stop routing notifications, fail outstanding waiters and drop the link.
    pub async fn close(self) -> Result<()> {
        self.pump.abort();
        self.correlator.close();
        info!(device = %self.transport.device_name(), "Session closed");
        self.transport.disconnect().await
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.pump.abort();
    }
}
