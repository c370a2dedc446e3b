//! Shared types and the error enum for avl-core.

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// All errors produced by avl-core.
#[derive(Debug, Error)]
pub enum AvlError {
    #[error("truncated frame: needed {needed} more byte(s) at offset {offset}")]
    Truncated { offset: usize, needed: usize },
    #[error("unknown Ruptela command type: {0:#04x}")]
    UnknownCommand(u8),
    #[error("unsupported Teltonika codec: {0:#04x}")]
    UnsupportedCodec(u8),
    #[error("invalid IMEI payload: {0}")]
    InvalidImei(String),
}

pub type Result<T> = std::result::Result<T, AvlError>;

// ---------------------------------------------------------------------------
// Protocol
// ---------------------------------------------------------------------------

/// The two supported tracker protocols. Selected once at startup from
/// configuration, never inferred from traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Ruptela,
    Teltonika,
}

impl Protocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Ruptela => "ruptela",
            Protocol::Teltonika => "teltonika",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Protocol {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "ruptela" => Ok(Protocol::Ruptela),
            "teltonika" => Ok(Protocol::Teltonika),
            other => Err(format!("unknown protocol: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Position records
// ---------------------------------------------------------------------------

/// GeoJSON-style point. Coordinates are `[lon, lat]` in WGS84 degrees.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPoint {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub coordinates: [f64; 2],
}

impl GeoPoint {
    pub fn new(lon: f64, lat: f64) -> Self {
        GeoPoint {
            kind: "Point",
            coordinates: [lon, lat],
        }
    }

    pub fn lon(&self) -> f64 {
        self.coordinates[0]
    }

    pub fn lat(&self) -> f64 {
        self.coordinates[1]
    }
}

/// One sensor reading. Sensor bytes are consumed from the wire but not
/// yet retained, so this currently never appears in decoded output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorReading {
    pub sensor_id: u8,
    pub value: u64,
}

/// One decoded GPS fix. A record only exists if its coordinates passed
/// bounds validation at decode time; `valid` reflects satellite count only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionRecord {
    pub imei: String,
    pub location: GeoPoint,
    #[serde(rename = "alt")]
    pub altitude: f64,
    pub course: f64,
    pub speed: i32,
    pub satellites: i32,
    pub sensors: Vec<SensorReading>,
    /// Device clock, epoch seconds, from the frame.
    pub gpstime: i64,
    /// Server clock, epoch seconds, at decode time.
    pub timestamp: i64,
    pub protocol: Protocol,
    pub valid: bool,
}

/// Result of decoding one read from a device connection.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecodedFrame {
    /// IMEI learned from this frame, if the frame carries one.
    pub imei: Option<String>,
    /// Records that passed coordinate validation, in frame order.
    pub records: Vec<PositionRecord>,
    /// Bytes to write back to the device. May be empty.
    pub ack: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Zero-left-pad an IMEI string to 15 characters.
pub fn pad_imei(imei: &str) -> String {
    format!("{imei:0>15}")
}

/// Current server clock as epoch seconds.
pub fn now_epoch() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
