//! End-to-end print jobs against an in-memory printer.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::channel::mpsc;
use image::{Rgba, RgbaImage};

use catprinter::detect::{self, DetectionMethod};
use catprinter::protocol::{Family, Frame, build_frame, gb, mxw01, parse_frame};
use catprinter::{
    CatPrinter, CatPrinterError, Channel, NotificationStream, PrintOptions, PrintProgress,
    PrintState, Result, Session, Transport,
};
use image_processor::{DitherMethod, MIN_FEED_ROWS};

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const ROW_BYTES: usize = 48;

enum Reply {
    Silent,
    Notify(Vec<u8>),
    /// Drop the notification stream, as if the link went down.
    HangUp,
}

type Responder = Box<dyn Fn(&Frame) -> Reply + Send + Sync>;

struct MockPrinter {
    name: String,
    data_channel: bool,
    writes: Mutex<Vec<(Channel, Vec<u8>)>>,
    notify_tx: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    notify_rx: Mutex<Option<mpsc::UnboundedReceiver<Vec<u8>>>>,
    responder: Responder,
}

impl MockPrinter {
    fn new(
        name: &str,
        data_channel: bool,
        responder: impl Fn(&Frame) -> Reply + Send + Sync + 'static,
    ) -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded();
        Arc::new(Self {
            name: name.to_string(),
            data_channel,
            writes: Mutex::new(Vec::new()),
            notify_tx: Mutex::new(Some(tx)),
            notify_rx: Mutex::new(Some(rx)),
            responder: Box::new(responder),
        })
    }

    fn writes(&self) -> Vec<(Channel, Vec<u8>)> {
        self.writes.lock().unwrap().clone()
    }

    fn control_commands(&self) -> Vec<(Family, u8)> {
        self.writes()
            .iter()
            .filter(|(channel, _)| *channel == Channel::Control)
            .filter_map(|(_, bytes)| parse_frame(bytes))
            .map(|frame| (frame.family, frame.command))
            .collect()
    }

    fn data_writes(&self) -> Vec<Vec<u8>> {
        self.writes()
            .into_iter()
            .filter(|(channel, _)| *channel == Channel::Data)
            .map(|(_, bytes)| bytes)
            .collect()
    }
}

#[async_trait]
impl Transport for MockPrinter {
    fn device_name(&self) -> &str {
        &self.name
    }

    fn has_data_channel(&self) -> bool {
        self.data_channel
    }

    fn is_connected(&self) -> bool {
        self.notify_tx.lock().unwrap().is_some()
    }

    async fn write(&self, channel: Channel, data: &[u8]) -> Result<()> {
        self.writes.lock().unwrap().push((channel, data.to_vec()));
        if channel != Channel::Control {
            return Ok(());
        }
        let Some(frame) = parse_frame(data) else {
            return Ok(());
        };
        match (self.responder)(&frame) {
            Reply::Silent => {}
            Reply::Notify(bytes) => {
                if let Some(tx) = self.notify_tx.lock().unwrap().as_ref() {
                    let _ = tx.unbounded_send(bytes);
                }
            }
            Reply::HangUp => {
                self.notify_tx.lock().unwrap().take();
            }
        }
        Ok(())
    }

    async fn notifications(&self) -> Result<NotificationStream> {
        let rx = self
            .notify_rx
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| CatPrinterError::ConnectionFailed("already subscribed".into()))?;
        Ok(Box::pin(rx))
    }

    async fn disconnect(&self) -> Result<()> {
        self.notify_tx.lock().unwrap().take();
        Ok(())
    }
}

fn status_payload(battery: u8, error_code: Option<u8>) -> Vec<u8> {
    let mut payload = vec![0u8; 14];
    payload[9] = battery;
    payload[10] = 30;
    if let Some(code) = error_code {
        payload[12] = 1;
        payload[13] = code;
    }
    payload
}

/// An MXW01 that answers status, battery, print request and flush.
fn framed_responder(ack: u8, status: Vec<u8>) -> impl Fn(&Frame) -> Reply + Send + Sync {
    move |frame: &Frame| {
        if frame.family != Family::Mxw01 {
            return Reply::Silent;
        }
        match frame.command {
            mxw01::CMD_GET_STATUS => notify(mxw01::CMD_GET_STATUS, &status),
            mxw01::CMD_GET_BATTERY => notify(mxw01::CMD_GET_BATTERY, &[0x55]),
            mxw01::CMD_PRINT_REQUEST => notify(mxw01::CMD_PRINT_REQUEST, &[ack]),
            mxw01::CMD_FLUSH => notify(mxw01::CMD_PRINT_COMPLETE, &[0x00]),
            _ => Reply::Silent,
        }
    }
}

fn notify(command: u8, payload: &[u8]) -> Reply {
    Reply::Notify(build_frame(Family::Mxw01, command, payload))
}

fn healthy_framed() -> impl Fn(&Frame) -> Reply + Send + Sync {
    framed_responder(0x00, status_payload(77, None))
}

fn silent(_: &Frame) -> Reply {
    Reply::Silent
}

fn black_raster(rows: u32) -> RgbaImage {
    RgbaImage::from_pixel(384, rows, BLACK)
}

fn threshold_options() -> PrintOptions {
    PrintOptions::new().with_dither(DitherMethod::Threshold)
}

#[tokio::test(start_paused = true)]
async fn framed_print_sends_padded_bitmap() {
    let device = MockPrinter::new("MXW01", true, healthy_framed());
    let mut printer = CatPrinter::new();
    assert_eq!(printer.attach(device.clone()).await.unwrap(), Family::Mxw01);

    let mut seen = Vec::new();
    printer
        .print_image_with_progress(&black_raster(20), &threshold_options(), |p| seen.push(p))
        .await
        .unwrap();

    let chunks = device.data_writes();
    assert_eq!(chunks.len(), MIN_FEED_ROWS);
    assert!(chunks.iter().all(|chunk| chunk.len() == ROW_BYTES));
    let data = chunks.concat();
    assert!(data[..20 * ROW_BYTES].iter().all(|&b| b == 0xff));
    assert!(data[20 * ROW_BYTES..].iter().all(|&b| b == 0x00));

    let commands = device.control_commands();
    let job: Vec<u8> = commands
        .iter()
        .skip_while(|(_, command)| *command != mxw01::CMD_SET_INTENSITY)
        .map(|(_, command)| *command)
        .collect();
    assert_eq!(
        job,
        vec![
            mxw01::CMD_SET_INTENSITY,
            mxw01::CMD_GET_STATUS,
            mxw01::CMD_PRINT_REQUEST,
            mxw01::CMD_FLUSH,
        ]
    );

    let request = device
        .writes()
        .into_iter()
        .filter_map(|(_, bytes)| parse_frame(&bytes))
        .find(|frame| frame.command == mxw01::CMD_PRINT_REQUEST)
        .unwrap();
    assert_eq!(request.payload, vec![MIN_FEED_ROWS as u8, 0x00, 0x30, 0x00]);

    let states: Vec<PrintState> = seen.iter().map(|p| p.state).collect();
    let first = |state: PrintState| states.iter().position(|s| *s == state).unwrap();
    assert!(first(PrintState::Encoding) < first(PrintState::SettingIntensity));
    assert!(first(PrintState::RequestingPrint) < first(PrintState::TransferringData));
    assert!(first(PrintState::Flushing) < first(PrintState::AwaitingCompletion));
    assert!(seen.windows(2).all(|w| w[0].percent <= w[1].percent));
    assert_eq!(
        seen.last(),
        Some(&PrintProgress { state: PrintState::Idle, percent: 100 })
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_print_request_sends_no_data() {
    let device = MockPrinter::new("MXW01", true, framed_responder(0x01, status_payload(50, None)));
    let mut printer = CatPrinter::new();
    printer.attach(device.clone()).await.unwrap();

    let err = printer
        .print_image(&black_raster(20), &threshold_options())
        .await
        .unwrap_err();
    assert!(matches!(err, CatPrinterError::PrintRejected { status: 1 }));
    assert!(device.data_writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn device_error_aborts_before_print_request() {
    let device = MockPrinter::new("MXW01", true, framed_responder(0x00, status_payload(50, Some(5))));
    let mut printer = CatPrinter::new();
    printer.attach(device.clone()).await.unwrap();

    let err = printer
        .print_image(&black_raster(8), &threshold_options())
        .await
        .unwrap_err();
    assert!(matches!(err, CatPrinterError::DeviceError { code: 5 }));
    assert!(!device
        .control_commands()
        .contains(&(Family::Mxw01, mxw01::CMD_PRINT_REQUEST)));
}

#[tokio::test(start_paused = true)]
async fn wrong_width_is_rejected_without_io() {
    let device = MockPrinter::new("MXW01", true, healthy_framed());
    let mut printer = CatPrinter::new();
    printer.attach(device.clone()).await.unwrap();
    let writes_before = device.writes().len();

    let err = printer
        .print_image(&RgbaImage::from_pixel(200, 10, BLACK), &PrintOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CatPrinterError::InvalidImageSize { expected: 384, actual: 200 }
    ));
    assert_eq!(device.writes().len(), writes_before);
}

#[tokio::test]
async fn calls_without_connection_fail() {
    let mut printer = CatPrinter::new();
    assert!(!printer.is_connected());
    assert!(printer.family().is_none());
    assert!(matches!(printer.get_status().await, Err(CatPrinterError::NotConnected)));
    assert!(matches!(
        printer.print_image(&black_raster(1), &PrintOptions::default()).await,
        Err(CatPrinterError::NotConnected)
    ));
}

#[tokio::test(start_paused = true)]
async fn framed_status_and_battery() {
    let device = MockPrinter::new("MXW01", true, healthy_framed());
    let mut printer = CatPrinter::new();
    printer.attach(device).await.unwrap();

    let status = printer.get_status().await.unwrap();
    assert_eq!(status.battery_percent, Some(77));
    assert!(!status.has_error());
    assert_eq!(printer.get_battery_level().await.unwrap(), 0x55);
}

#[tokio::test(start_paused = true)]
async fn link_loss_fails_pending_request() {
    let device = MockPrinter::new("MXW01", true, |frame: &Frame| match frame.command {
        mxw01::CMD_PRINT_REQUEST => Reply::HangUp,
        _ => healthy_framed()(frame),
    });
    let mut printer = CatPrinter::new();
    printer.attach(device.clone()).await.unwrap();

    let err = printer
        .print_image(&black_raster(4), &threshold_options())
        .await
        .unwrap_err();
    assert!(matches!(err, CatPrinterError::ConnectionLost));
    assert!(!printer.is_connected());
    assert!(device.data_writes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn missing_completion_is_a_warning() {
    let device = MockPrinter::new("MXW01", true, |frame: &Frame| match frame.command {
        mxw01::CMD_FLUSH => Reply::Silent,
        _ => healthy_framed()(frame),
    });
    let mut printer = CatPrinter::new();
    printer.attach(device.clone()).await.unwrap();

    let started = tokio::time::Instant::now();
    printer
        .print_image(&black_raster(20), &threshold_options())
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_secs(20));
    assert_eq!(device.data_writes().len(), MIN_FEED_ROWS);
    assert!(printer.is_connected());
}

#[tokio::test(start_paused = true)]
async fn request_timeout_keeps_session_usable() {
    let device = MockPrinter::new("MXW01", true, |frame: &Frame| match frame.command {
        mxw01::CMD_GET_BATTERY => Reply::Silent,
        _ => healthy_framed()(frame),
    });
    let mut printer = CatPrinter::new();
    printer.attach(device).await.unwrap();

    let err = printer.get_battery_level().await.unwrap_err();
    assert!(matches!(
        err,
        CatPrinterError::RequestTimeout { command: 0xab, .. }
    ));
    assert!(printer.is_connected());

    let status = printer.get_status().await.unwrap();
    assert_eq!(status.battery_percent, Some(77));
}

#[tokio::test(start_paused = true)]
async fn failed_subscription_disconnects_transport() {
    let device = MockPrinter::new("MXW01", true, healthy_framed());
    // Take the only notification stream so the session cannot subscribe.
    let _stream = device.notifications().await.unwrap();
    assert!(device.is_connected());

    let mut printer = CatPrinter::new();
    let err = printer.attach(device.clone()).await.unwrap_err();
    assert!(matches!(err, CatPrinterError::ConnectionFailed(_)));
    assert!(!printer.is_connected());
    assert!(!device.is_connected());
}

#[tokio::test(start_paused = true)]
async fn legacy_name_skips_detection_and_prints_on_control() {
    let device = MockPrinter::new("GB02", false, silent);
    let mut printer = CatPrinter::new();
    assert_eq!(printer.attach(device.clone()).await.unwrap(), Family::Gb);
    assert!(device.writes().is_empty());

    let status = printer.get_status().await.unwrap();
    assert_eq!(status.battery_percent, Some(100));
    assert_eq!(printer.get_battery_level().await.unwrap(), 100);

    printer
        .print_image(&black_raster(8), &threshold_options())
        .await
        .unwrap();

    assert!(device.data_writes().is_empty());
    let commands: Vec<u8> = device
        .control_commands()
        .into_iter()
        .map(|(family, command)| {
            assert_eq!(family, Family::Gb);
            command
        })
        .collect();
    assert_eq!(
        &commands[..6],
        &[
            gb::CMD_START_PRINT,
            gb::CMD_SET_DPI,
            gb::CMD_SET_SPEED,
            gb::CMD_SET_ENERGY,
            gb::CMD_APPLY_ENERGY,
            gb::CMD_LATTICE,
        ]
    );
    let rows = &commands[6..6 + MIN_FEED_ROWS];
    assert!(rows.iter().all(|&c| c == gb::CMD_PRINT_ROW));
    assert_eq!(&commands[6 + MIN_FEED_ROWS..], &[gb::CMD_LATTICE, gb::CMD_FEED_PAPER]);
}

#[tokio::test(start_paused = true)]
async fn detects_framed_printer_by_reply() {
    let device = MockPrinter::new("Printer", true, healthy_framed());
    let session = Session::open(device.clone()).await.unwrap();
    let detection = detect::detect(&session).await.unwrap();

    assert_eq!(detection.family, Family::Mxw01);
    assert_eq!(detection.method, DetectionMethod::Probe);
    assert_eq!(session.correlator().family(), Some(Family::Mxw01));
    // Both dialects were asked.
    let commands = device.control_commands();
    assert!(commands.contains(&(Family::Mxw01, mxw01::CMD_GET_STATUS)));
    assert!(commands.contains(&(Family::Gb, gb::CMD_START_PRINT)));
}

#[tokio::test(start_paused = true)]
async fn detects_legacy_printer_by_reply() {
    let device = MockPrinter::new("", true, |frame: &Frame| {
        if frame.family == Family::Gb {
            Reply::Notify(build_frame(Family::Gb, frame.command, &[0x00]))
        } else {
            Reply::Silent
        }
    });
    let session = Session::open(device).await.unwrap();
    let detection = detect::detect(&session).await.unwrap();

    assert_eq!(detection.family, Family::Gb);
    assert_eq!(detection.method, DetectionMethod::Probe);
}

#[tokio::test(start_paused = true)]
async fn silent_printer_defaults_by_data_channel() {
    let with_data = Session::open(MockPrinter::new("", true, silent)).await.unwrap();
    let detection = detect::detect_with_window(&with_data, Duration::from_millis(500))
        .await
        .unwrap();
    assert_eq!(detection.family, Family::Mxw01);
    assert_eq!(detection.method, DetectionMethod::Default);
    assert!(!with_data.correlator().has_probe());

    let without_data = Session::open(MockPrinter::new("", false, silent)).await.unwrap();
    let detection = detect::detect(&without_data).await.unwrap();
    assert_eq!(detection.family, Family::Gb);
    assert_eq!(detection.method, DetectionMethod::Default);
}

#[tokio::test(start_paused = true)]
async fn framed_reply_without_data_channel_is_rejected() {
    let device = MockPrinter::new("", false, healthy_framed());
    let mut printer = CatPrinter::new();

    let err = printer.attach(device.clone()).await.unwrap_err();
    assert!(matches!(err, CatPrinterError::MissingCharacteristic("data")));
    assert!(!printer.is_connected());
    assert!(!device.is_connected());
}

#[tokio::test(start_paused = true)]
async fn reattach_closes_previous_connection() {
    let first = MockPrinter::new("GB01", false, silent);
    let second = MockPrinter::new("MXW01", true, healthy_framed());
    let mut printer = CatPrinter::new();

    printer.attach(first.clone()).await.unwrap();
    assert!(printer.is_connected());
    assert_eq!(printer.attach(second).await.unwrap(), Family::Mxw01);
    assert!(!first.is_connected());
    assert_eq!(printer.family(), Some(Family::Mxw01));

    printer.disconnect().await.unwrap();
    assert!(!printer.is_connected());
}
