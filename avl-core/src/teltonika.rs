//! Teltonika protocol decoder.
//!
//! Two-phase protocol keyed on the first two bytes of each message:
//! - non-zero: identification phase, the device sends its ASCII IMEI
//! - zero: data phase, an AVL batch follows (codec byte + records)
//!
//! Codec 8 (FM4X00 family) records are parsed. Codec 12 (GPRS command
//! channel) and GH3000 batches are rejected as a whole: GH3000 records
//! have a different layout, and parsing the batch with the codec 8
//! layout would desynchronize every record after the first.

use crate::cursor::Cursor;
use crate::types::{
    now_epoch, pad_imei, AvlError, DecodedFrame, GeoPoint, PositionRecord, Protocol, Result,
};
use crate::validate::{record_valid, valid_coordinates};

pub const CODEC_GH3000: u8 = 0x07;
pub const CODEC_FM4X00: u8 = 0x08;
pub const CODEC_12: u8 = 0x0C;

/// Acknowledgement for the identification phase.
pub const ACK_IMEI: [u8; 1] = [0x01];

/// Trailing event/IO bytes per codec 8 record, consumed but not retained.
const RECORD_SENSOR_SKIP: usize = 6;

/// Decode one Teltonika message. `learned_imei` is the identifier from
/// the connection's identification phase; data-phase records carry it.
pub fn decode(buf: &[u8], learned_imei: &str) -> Result<DecodedFrame> {
    let mut cur = Cursor::new(buf);
    let start = cur.read_u16()?;

    if start > 0 {
        decode_imei(&cur)
    } else {
        decode_records(&mut cur, learned_imei)
    }
}

/// Identification phase: the rest of the buffer, truncated to 15 bytes,
/// is the ASCII IMEI. Shorter identifiers are zero-left-padded.
fn decode_imei(cur: &Cursor<'_>) -> Result<DecodedFrame> {
    let rest = cur.rest();
    let raw = &rest[..rest.len().min(15)];
    let imei = std::str::from_utf8(raw)
        .map_err(|_| AvlError::InvalidImei(format!("{raw:02x?}")))?;

    Ok(DecodedFrame {
        imei: Some(pad_imei(imei)),
        records: Vec::new(),
        ack: ACK_IMEI.to_vec(),
    })
}

/// Data phase: codec byte, record count, then codec 8 record bodies.
fn decode_records(cur: &mut Cursor<'_>, imei: &str) -> Result<DecodedFrame> {
    cur.skip(2)?; // remainder of the 4-byte preamble
    let _data_length = cur.read_u32()?;
    let codec = cur.read_u8()?;

    // GH3000 uses a different record layout; a batch cannot be parsed
    // with the codec 8 field offsets, so reject it whole.
    if codec == CODEC_12 || codec == CODEC_GH3000 {
        return Err(AvlError::UnsupportedCodec(codec));
    }

    let record_count = cur.read_u8()?;
    let mut records = Vec::with_capacity(record_count as usize);
    let ingest_time = now_epoch();

    for _ in 0..record_count {
        let gpstime_ms = cur.read_u64()?;
        let _priority = cur.read_u8()?;
        let lon_raw = cur.read_i32()?;
        let lat_raw = cur.read_i32()?;
        let alt_raw = cur.read_i16()?;
        let course_raw = cur.read_u16()?;
        let satellites = cur.read_u8()?;
        let speed = cur.read_u16()?;
        // Event/IO bytes are consumed for every record, valid or not,
        // so a dropped record cannot shift the cursor for the rest of
        // the batch.
        cur.skip(RECORD_SENSOR_SKIP)?;

        let lon = f64::from(lon_raw) / 10_000_000.0;
        let lat = f64::from(lat_raw) / 10_000_000.0;

        if !valid_coordinates(lat, lon) {
            continue;
        }

        records.push(PositionRecord {
            imei: imei.to_string(),
            location: GeoPoint::new(lon, lat),
            altitude: f64::from(alt_raw) / 10.0,
            course: f64::from(course_raw) / 100.0,
            speed: i32::from(speed),
            satellites: i32::from(satellites),
            sensors: Vec::new(),
            gpstime: (gpstime_ms / 1000) as i64,
            timestamp: ingest_time,
            protocol: Protocol::Teltonika,
            valid: record_valid(satellites),
        });
    }

    // Ack carries the post-filter count, so the device resends nothing
    // but knows how many records the server actually took.
    let ack = (records.len() as u32).to_be_bytes().to_vec();

    Ok(DecodedFrame {
        imei: None,
        records,
        ack,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
