//! Setting value validation.

use std::str::FromStr;
use std::sync::LazyLock;

use image_processor::DitherMethod;
use regex::Regex;

static RE_MAC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9A-Fa-f]{2}[:\-]){5}([0-9A-Fa-f]{2})$").unwrap());
static RE_UUID_NO_HYPHEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{32}$").unwrap());
static RE_UUID_HYPHEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Fa-f]{8}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{4}-[0-9A-Fa-f]{12}$")
        .unwrap()
});
static RE_MAC_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{1,2}(:[0-9A-Fa-f]{0,2})+$").unwrap());

/// Longest name a BLE device can advertise (GAP Device Name).
const MAX_DEVICE_NAME_LEN: usize = 248;

/// Validate a setting value. Returns `Ok(())` if valid, or an error message.
pub fn validate_setting(key: &str, value: &str) -> Result<(), String> {
    match key {
        "PRINTER_ADDRESS" => validate_printer_target(value)?,
        "PRINT_INTENSITY" => validate_int_range(value, 0, 100)?,
        "THRESHOLD" => validate_int_range(value, 0, 255)?,
        "SCAN_TIMEOUT" => validate_int_range(value, 1, 120)?,
        "DITHER_METHOD" => {
            if DitherMethod::from_str(value).is_err() {
                let names: Vec<&str> = DitherMethod::ALL.iter().map(|m| m.as_str()).collect();
                return Err(format!("must be one of {}", names.join(", ")));
            }
        }
        "ROTATE_PRINT" => {
            if value != "true" && value != "false" {
                return Err("must be 'true' or 'false'".into());
            }
        }
        _ => {}
    }
    Ok(())
}

/// A MAC address, a CoreBluetooth UUID or an advertised device name.
fn validate_printer_target(value: &str) -> Result<(), String> {
    if value.is_empty()
        || RE_MAC.is_match(value)
        || RE_UUID_NO_HYPHEN.is_match(value)
        || RE_UUID_HYPHEN.is_match(value)
    {
        return Ok(());
    }
    if RE_MAC_LIKE.is_match(value) {
        return Err("invalid MAC address (expected six hex pairs)".into());
    }
    if value.len() > MAX_DEVICE_NAME_LEN {
        return Err(format!("device name longer than {MAX_DEVICE_NAME_LEN} bytes"));
    }
    if value.chars().any(char::is_control) {
        return Err("device name contains control characters".into());
    }
    Ok(())
}

fn validate_int_range(value: &str, min: i32, max: i32) -> Result<(), String> {
    let v: i32 = value.parse().map_err(|_| "must be an integer")?;
    if v < min || v > max {
        return Err(format!("must be between {min} and {max}"));
    }
    Ok(())
}
