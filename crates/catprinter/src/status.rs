//! Decoded printer status.

/// Coarse device state reported in the status payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterState {
    Standby,
    Printing,
    Error(u8),
    Unknown,
}

/// Snapshot of a status query. Refreshed on every request, never cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterStatus {
    pub battery_percent: Option<u8>,
    pub temperature: Option<u8>,
    pub state: PrinterState,
    /// Device error code when the error flag is set.
    pub error_code: Option<u8>,
    pub raw: Vec<u8>,
}

impl PrinterStatus {
    /// Parse an MXW01 status payload.
    ///
    /// Payload mapping:
    /// - payload[6]: status flag (0 = Standby, 1 = Printing)
    /// - payload[9]: battery percent
    /// - payload[10]: temperature
    /// - payload[12]: error flag (non-zero = error)
    /// - payload[13]: error code
    pub fn parse(payload: &[u8]) -> Self {
        let mut status = Self {
            battery_percent: None,
            temperature: None,
            state: PrinterState::Unknown,
            error_code: None,
            raw: payload.to_vec(),
        };
        if payload.len() < 13 {
            return status;
        }

        status.battery_percent = Some(payload[9]);
        status.temperature = Some(payload[10]);
        let error_flag = payload[12];
        if error_flag != 0 {
            let code = payload.get(13).copied().unwrap_or(error_flag);
            status.error_code = Some(code);
            status.state = PrinterState::Error(code);
        } else {
            status.state = match payload[6] {
                0 => PrinterState::Standby,
                1 => PrinterState::Printing,
                _ => PrinterState::Unknown,
            };
        }
        status
    }

    /// Fixed status for devices that cannot report one.
    pub fn placeholder() -> Self {
        Self {
            battery_percent: Some(100),
            temperature: None,
            state: PrinterState::Standby,
            error_code: None,
            raw: Vec::new(),
        }
    }

    pub fn has_error(&self) -> bool {
        self.error_code.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(state: u8, battery: u8, temp: u8, flag: u8, code: u8) -> Vec<u8> {
        let mut p = vec![0u8; 14];
        p[6] = state;
        p[9] = battery;
        p[10] = temp;
        p[12] = flag;
        p[13] = code;
        p
    }

    #[test]
    fn test_parse_standby() {
        let status = PrinterStatus::parse(&payload(0, 87, 31, 0, 0));
        assert_eq!(status.state, PrinterState::Standby);
        assert_eq!(status.battery_percent, Some(87));
        assert_eq!(status.temperature, Some(31));
        assert!(!status.has_error());
    }

    #[test]
    fn test_parse_error_code() {
        let status = PrinterStatus::parse(&payload(0, 50, 30, 1, 0x08));
        assert_eq!(status.state, PrinterState::Error(0x08));
        assert_eq!(status.error_code, Some(0x08));
    }

    #[test]
    fn test_parse_short_payload() {
        let status = PrinterStatus::parse(&[0x00, 0x01]);
        assert_eq!(status.state, PrinterState::Unknown);
        assert_eq!(status.battery_percent, None);
        assert_eq!(status.raw, vec![0x00, 0x01]);
    }
}
