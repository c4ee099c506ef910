//! Notification correlation.
//!
//! Every inbound notification is parsed and handed to the single waiter
//! registered for its command id. Waiters are one-shot: they are removed when
//! resolved, when they time out, or when a newer waiter for the same id
//! replaces them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::{Family, Frame, parse_frame};
use crate::transport::NotificationStream;
use crate::{CatPrinterError, Result};

type Reply = Result<Frame>;

struct Waiter {
    seq: u64,
    tx: oneshot::Sender<Reply>,
}

#[derive(Default)]
struct Table {
    /// Active dialect; frames from the other family are dropped once set.
    family: Option<Family>,
    pending: HashMap<u8, Waiter>,
    /// Listener for the first frame of any known family (protocol detection).
    probe: Option<oneshot::Sender<Frame>>,
    next_seq: u64,
    closed: bool,
}

/// Command-id keyed table of outstanding requests for one session.
#[derive(Clone, Default)]
pub struct Correlator {
    table: Arc<Mutex<Table>>,
}

impl Correlator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Restrict dispatch to frames of `family`.
    pub fn set_family(&self, family: Family) {
        self.lock().family = Some(family);
    }

    pub fn family(&self) -> Option<Family> {
        self.lock().family
    }

    /// Register a one-shot waiter for `command`.
    ///
    /// Register before writing the request so a fast reply is not missed.
    /// A waiter already registered for the same id is woken with
    /// [`CatPrinterError::RequestSuperseded`].
    pub fn register(&self, command: u8) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let mut table = self.lock();
        let seq = table.next_seq;
        table.next_seq += 1;

        if table.closed {
            let _ = tx.send(Err(CatPrinterError::ConnectionLost));
        } else if let Some(previous) = table.pending.insert(command, Waiter { seq, tx }) {
            warn!(command, "Replacing outstanding waiter for the same command");
            let _ = previous.tx.send(Err(CatPrinterError::RequestSuperseded(command)));
        }

        PendingResponse {
            command,
            seq,
            rx,
            correlator: self.clone(),
        }
    }

    /// Route one raw notification to its waiter.
    pub fn dispatch(&self, raw: &[u8]) {
        let Some(frame) = parse_frame(raw) else {
            trace!(len = raw.len(), "Dropping notification with unknown magic");
            return;
        };

        let mut table = self.lock();
        if let Some(probe) = table.probe.take() {
            debug!(family = %frame.family, command = frame.command, "Probe answered");
            let _ = probe.send(frame.clone());
        }

        if let Some(family) = table.family {
            if frame.family != family {
                trace!(expected = %family, got = %frame.family, "Dropping frame from other protocol family");
                return;
            }
        }

        match table.pending.remove(&frame.command) {
            Some(waiter) => {
                debug!(command = frame.command, len = frame.payload.len(), "Resolved pending request");
                let _ = waiter.tx.send(Ok(frame));
            }
            None => {
                debug!(command = frame.command, "Unsolicited notification, discarding");
            }
        }
    }

    /// Fail every outstanding waiter with [`CatPrinterError::ConnectionLost`]
    /// and refuse new registrations.
    pub fn close(&self) {
        let mut table = self.lock();
        if table.closed {
            return;
        }
        table.closed = true;
        table.probe = None;
        for (command, waiter) in table.pending.drain() {
            debug!(command, "Failing pending request: connection lost");
            let _ = waiter.tx.send(Err(CatPrinterError::ConnectionLost));
        }
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn pending_count(&self) -> usize {
        self.lock().pending.len()
    }

    /// Install the detection listener. Resolves with the first frame of a
    /// known family; dropped (receiver errors) if the link closes first.
    pub(crate) fn start_probe(&self) -> oneshot::Receiver<Frame> {
        let (tx, rx) = oneshot::channel();
        let mut table = self.lock();
        if !table.closed {
            table.probe = Some(tx);
        }
        rx
    }

    /// Remove the detection listener. Returns false if a frame or a close
    /// already took it.
    pub(crate) fn cancel_probe(&self) -> bool {
        self.lock().probe.take().is_some()
    }

    /// Whether a detection listener is still installed.
    pub fn has_probe(&self) -> bool {
        self.lock().probe.is_some()
    }

    fn remove_if_current(&self, command: u8, seq: u64) {
        let mut table = self.lock();
        if table.pending.get(&command).is_some_and(|w| w.seq == seq) {
            table.pending.remove(&command);
        }
    }

    /// Feed `stream` into this correlator on a background task. The
    /// correlator is closed when the stream ends.
    pub fn spawn_pump(&self, mut stream: NotificationStream) -> JoinHandle<()> {
        use futures::StreamExt;

        let correlator = self.clone();
        tokio::spawn(async move {
            while let Some(bytes) = stream.next().await {
                correlator.dispatch(&bytes);
            }
            debug!("Notification stream ended");
            correlator.close();
        })
    }
}

/// A registered waiter, resolved by [`Correlator::dispatch`].
pub struct PendingResponse {
    command: u8,
    seq: u64,
    rx: oneshot::Receiver<Reply>,
    correlator: Correlator,
}

impl PendingResponse {
    /// Wait for the correlated frame. On timeout the waiter is removed so a
    /// late reply is discarded instead of resolving a stale request.
    pub async fn wait(self, timeout: Duration) -> Result<Frame> {
        let PendingResponse {
            command,
            seq,
            rx,
            correlator,
        } = self;

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(reply)) => reply,
            Ok(Err(_)) => Err(CatPrinterError::ConnectionLost),
            Err(_) => {
                correlator.remove_if_current(command, seq);
                Err(CatPrinterError::RequestTimeout {
                    command,
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Withdraw the waiter without waiting (e.g. the request write failed).
    pub fn cancel(self) {
        self.correlator.remove_if_current(self.command, self.seq);
    }
}
