//! Ruptela protocol decoder.
//!
//! Frame layout (big-endian):
//! - 2 bytes  packet length (skipped)
//! - 8 bytes  IMEI as unsigned integer
//! - 1 byte   command type (0x01 = records)
//! - 1 byte   records left on device
//! - 1 byte   record count in this frame
//! - per record: timestamp, reserved, lon, lat, altitude, course,
//!   satellites, speed, reserved, then four variable-length sensor
//!   groups with value widths 1/2/4/8 bytes.
//!
//! The IMEI travels in every frame, so this protocol has no separate
//! identification phase.

use crate::cursor::Cursor;
use crate::types::{
    now_epoch, pad_imei, AvlError, DecodedFrame, GeoPoint, PositionRecord, Protocol, Result,
};
use crate::validate::{record_valid, valid_coordinates};

/// Command type for position record upload.
pub const COMMAND_RECORDS: u8 = 0x01;

/// Fixed acknowledgement for a records frame. Not record-count-aware;
/// kept bit-for-bit compatible with the deployed fleet.
pub const ACK: [u8; 6] = [0x00, 0x02, 0x64, 0x01, 0x13, 0xbc];

/// Sensor value widths, in the order the groups appear on the wire.
const SENSOR_WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// Decode one Ruptela frame. `_learned_imei` is unused: every frame
/// names its own device.
pub fn decode(buf: &[u8], _learned_imei: &str) -> Result<DecodedFrame> {
    let mut cur = Cursor::new(buf);

    cur.skip(2)?;
    let imei = pad_imei(&cur.read_u64()?.to_string());
    let command = cur.read_u8()?;

    if command != COMMAND_RECORDS {
        return Err(AvlError::UnknownCommand(command));
    }

    let _records_left = cur.read_u8()?;
    let record_count = cur.read_u8()?;

    let mut records = Vec::with_capacity(record_count as usize);
    let ingest_time = now_epoch();

    for _ in 0..record_count {
        let gpstime = cur.read_u32()?;
        cur.skip(2)?;
        let lon_raw = cur.read_i32()?;
        let lat_raw = cur.read_i32()?;
        let alt_raw = cur.read_u16()?;
        let course_raw = cur.read_u16()?;
        let satellites = cur.read_u8()?;
        let speed = cur.read_u16()?;
        cur.skip(2)?;

        skip_sensor_groups(&mut cur)?;

        let lon = f64::from(lon_raw) / 10_000_000.0;
        let lat = f64::from(lat_raw) / 10_000_000.0;

        // Out-of-bounds fixes are dropped, never stored as invalid.
        // The sensor groups above were still fully consumed.
        if !valid_coordinates(lat, lon) {
            continue;
        }

        records.push(PositionRecord {
            imei: imei.clone(),
            location: GeoPoint::new(lon, lat),
            altitude: f64::from(alt_raw) / 10.0,
            course: f64::from(course_raw) / 100.0,
            speed: i32::from(speed),
            satellites: i32::from(satellites),
            sensors: Vec::new(),
            gpstime: i64::from(gpstime),
            timestamp: ingest_time,
            protocol: Protocol::Ruptela,
            valid: record_valid(satellites),
        });
    }

    Ok(DecodedFrame {
        imei: Some(imei),
        records,
        ack: ACK.to_vec(),
    })
}

/// Consume the four sensor groups trailing a record. Each group starts
/// with a count byte, then that many (id, value) pairs of the group's
/// value width. Values are not yet retained in the output record.
fn skip_sensor_groups(cur: &mut Cursor<'_>) -> Result<()> {
    for width in SENSOR_WIDTHS {
        let count = cur.read_u8()?;
        cur.skip(count as usize * (1 + width))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
