//! Runtime configuration loaded from the environment.

use std::time::Duration;

use anyhow::{Context, anyhow};
use catprinter::PrintOptions;
use image_processor::DitherMethod;

use crate::validation::validate_setting;

/// Settings read from the environment (and an optional `.env` file).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// MAC (Linux/Windows), CoreBluetooth UUID (macOS) or advertised name.
    /// Empty picks the first printer found.
    pub printer_address: String,
    pub intensity: u8,
    pub dither: DitherMethod,
    pub threshold: u8,
    pub rotate_print: bool,
    pub scan_timeout_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            printer_address: String::new(),
            intensity: 80,
            dither: DitherMethod::FloydSteinberg,
            threshold: 128,
            rotate_print: true,
            scan_timeout_secs: 10,
        }
    }
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment.
    pub fn load() -> anyhow::Result<Self> {
        load_dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a config from a key lookup. Unset or empty keys keep their
    /// defaults; set keys must pass [`validate_setting`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| -> anyhow::Result<Option<String>> {
            match lookup(key).map(|v| v.trim().to_string()) {
                Some(v) if !v.is_empty() => {
                    validate_setting(key, &v).map_err(|e| anyhow!("{key}: {e}"))?;
                    Ok(Some(v))
                }
                _ => Ok(None),
            }
        };

        let mut config = Self::default();
        if let Some(v) = get("PRINTER_ADDRESS")? {
            config.printer_address = v;
        }
        if let Some(v) = get("PRINT_INTENSITY")? {
            config.intensity = v.parse().context("PRINT_INTENSITY")?;
        }
        if let Some(v) = get("DITHER_METHOD")? {
            config.dither = v.parse().context("DITHER_METHOD")?;
        }
        if let Some(v) = get("THRESHOLD")? {
            config.threshold = v.parse().context("THRESHOLD")?;
        }
        if let Some(v) = get("ROTATE_PRINT")? {
            config.rotate_print = v == "true";
        }
        if let Some(v) = get("SCAN_TIMEOUT")? {
            config.scan_timeout_secs = v.parse().context("SCAN_TIMEOUT")?;
        }
        Ok(config)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }

    pub fn print_options(&self) -> PrintOptions {
        PrintOptions::new()
            .with_intensity(self.intensity)
            .with_dither(self.dither)
            .with_threshold(self.threshold)
            .with_rotate_print(self.rotate_print)
    }
}

/// Load .env from multiple candidate paths.
fn load_dotenv() {
    let candidates = [".env", "../.env", "../../.env"];
    for path in &candidates {
        if dotenvy::from_filename(path).is_ok() {
            tracing::info!("Loaded .env from: {path}");
            return;
        }
    }
    tracing::debug!("No .env file found, using system environment variables");
}
