//! Protocol family detection.
//!
//! Known legacy model names skip probing. Anything else gets both families'
//! status commands at once; the first notification carrying a known magic
//! decides. Silence defaults to MXW01 when the data characteristic exists.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::protocol::{Family, gb, mxw01};
use crate::session::Session;
use crate::transport::Channel;
use crate::{CatPrinterError, Result};

/// Advertised names of GB-family models (matched by containment).
pub const LEGACY_MODEL_NAMES: &[&str] = &[
    "GB01", "GB02", "GB03", "GT01", "YT01", "MX05", "MX06", "MX08", "MX09", "MX10", "MX11",
];

/// Advertised names of MXW01-family models. Only used to recognise printers
/// during scanning; these are still probed.
const FRAMED_MODEL_NAMES: &[&str] = &["MXW01"];

/// How long to wait for either family to answer the probe.
pub const PROBE_WINDOW: Duration = Duration::from_secs(2);

/// How the family was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionMethod {
    DeviceName,
    Probe,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Detection {
    pub family: Family,
    pub method: DetectionMethod,
}

pub fn is_legacy_model_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    LEGACY_MODEL_NAMES.iter().any(|model| upper.contains(model))
}

pub fn is_known_model_name(name: &str) -> bool {
    let upper = name.to_ascii_uppercase();
    is_legacy_model_name(name) || FRAMED_MODEL_NAMES.iter().any(|model| upper.contains(model))
}

/// Detect the family of a freshly opened session using [`PROBE_WINDOW`].
pub async fn detect(session: &Session) -> Result<Detection> {
    detect_with_window(session, PROBE_WINDOW).await
}

/// Detect the family and pin the session's correlator to it.
pub async fn detect_with_window(session: &Session, window: Duration) -> Result<Detection> {
    let transport = session.transport();
    let name = transport.device_name();

    let detection = if is_legacy_model_name(name) {
        info!(name = %name, "Legacy model name, skipping probe");
        Detection {
            family: Family::Gb,
            method: DetectionMethod::DeviceName,
        }
    } else {
        probe(session, window).await?
    };

    // MXW01 streams raster rows over the data characteristic.
    if detection.family == Family::Mxw01 && !transport.has_data_channel() {
        return Err(CatPrinterError::MissingCharacteristic("data"));
    }

    session.correlator().set_family(detection.family);
    info!(family = %detection.family, method = ?detection.method, "Printer family detected");
    Ok(detection)
}

async fn probe(session: &Session, window: Duration) -> Result<Detection> {
    let correlator = session.correlator();
    let mut listener = correlator.start_probe();

    let (framed_ping, legacy_ping) = (mxw01::get_status(), gb::start_print());
    let (framed, legacy) = futures::join!(
        session.send(Channel::Control, &framed_ping),
        session.send(Channel::Control, &legacy_ping),
    );
    match (framed, legacy) {
        (Err(err), Err(_)) => {
            correlator.cancel_probe();
            return Err(err);
        }
        (Err(err), Ok(())) | (Ok(()), Err(err)) => {
            warn!(error = %err, "One probe write failed, waiting for the other");
        }
        (Ok(()), Ok(())) => {}
    }

    let answered = match tokio::time::timeout(window, &mut listener).await {
        Ok(Ok(frame)) => Some(frame),
        Ok(Err(_)) => return Err(CatPrinterError::ConnectionLost),
        Err(_) => {
            // A frame may have slipped in between the deadline and the cancel.
            if correlator.cancel_probe() {
                None
            } else {
                listener.try_recv().ok()
            }
        }
    };

    Ok(match answered {
        Some(frame) => {
            debug!(family = %frame.family, command = frame.command, "Probe answered");
            Detection {
                family: frame.family,
                method: DetectionMethod::Probe,
            }
        }
        None => {
            let family = if session.transport().has_data_channel() {
                Family::Mxw01
            } else {
                Family::Gb
            };
            warn!(family = %family, "No probe response, using default family");
            Detection {
                family,
                method: DetectionMethod::Default,
            }
        }
    })
}
