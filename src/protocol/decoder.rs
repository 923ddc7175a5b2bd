//! Frame decoder
//!
//! Validates a complete frame and extracts its fields into a [`Reading`].
//! Validation short-circuits in this order: length, header, footer, checksum.
//! Field extraction then only fails on an impossible device timestamp.
//!
//! Byte order is mixed within a frame. Voltage and serial number are
//! little-endian; every other multi-byte field is big-endian.

use chrono::{DateTime, NaiveDate, Utc};
use tracing::trace;

use super::format::*;
use crate::{DeviceId, FrameError, Reading};

/// Decode one frame.
///
/// `bytes` must hold exactly [`FRAME_SIZE`] bytes. A shorter slice is
/// [`FrameError::Incomplete`], a longer one [`FrameError::Oversized`].
pub fn decode(bytes: &[u8]) -> Result<Reading, FrameError> {
    let frame: &Frame = bytes.try_into().map_err(|_| {
        let received = bytes.len();
        if received < FRAME_SIZE {
            FrameError::Incomplete { received, expected: FRAME_SIZE }
        } else {
            FrameError::Oversized { received, expected: FRAME_SIZE }
        }
    })?;

    validate(frame)?;

    let device_id =
        DeviceId::new(frame[DEVICE_TYPE_OFFSET], read_u16_le(frame, SERIAL_NUMBER_OFFSET));

    let reading = Reading {
        device_id,
        voltage: f64::from(read_u16_le(frame, VOLTAGE_OFFSET)) / VOLTAGE_SCALE,
        absolute_watt_seconds: std::array::from_fn(|i| {
            read_u40_be(frame, ABSOLUTE_WATT_SECONDS_OFFSET + i * WATT_SECONDS_WIDTH)
        }),
        polarized_watt_seconds: std::array::from_fn(|i| {
            read_u40_be(frame, POLARIZED_WATT_SECONDS_OFFSET + i * WATT_SECONDS_WIDTH)
        }),
        currents: std::array::from_fn(|i| {
            f64::from(read_u16_be(frame, CURRENT_OFFSET + i * 2)) / CURRENT_SCALE
        }),
        pulse_counters: std::array::from_fn(|i| {
            read_u24_be(frame, PULSE_COUNTER_OFFSET + i * COUNTER24_WIDTH)
        }),
        temperatures: std::array::from_fn(|i| {
            f64::from(read_u16_be(frame, TEMPERATURE_OFFSET + i * 2)) / TEMPERATURE_SCALE
        }),
        elapsed_seconds: read_u24_be(frame, SECONDS_OFFSET),
        device_time: read_timestamp(frame, TIMESTAMP_OFFSET)?,
    };

    trace!(device = %reading.device_id, seconds = reading.elapsed_seconds, "Decoded frame");
    Ok(reading)
}

/// Structural checks on a full-length frame.
pub fn validate(frame: &Frame) -> Result<(), FrameError> {
    let header = &frame[HEADER_OFFSET..HEADER_OFFSET + HEADER.len()];
    if header != HEADER {
        return Err(FrameError::HeaderMismatch { found: [header[0], header[1], header[2]] });
    }

    let footer = &frame[FOOTER_OFFSET..FOOTER_OFFSET + FOOTER.len()];
    if footer != FOOTER {
        return Err(FrameError::FooterMismatch { found: [footer[0], footer[1]] });
    }

    let expected = checksum(&frame[..CHECKSUM_OFFSET]);
    let found = frame[CHECKSUM_OFFSET];
    if expected != found {
        return Err(FrameError::ChecksumMismatch { expected, found });
    }

    Ok(())
}

fn read_u16_le(frame: &Frame, offset: usize) -> u16 {
    u16::from_le_bytes([frame[offset], frame[offset + 1]])
}

fn read_u16_be(frame: &Frame, offset: usize) -> u16 {
    u16::from_be_bytes([frame[offset], frame[offset + 1]])
}

/// 3 bytes big-endian, zero-extended to 32 bits.
fn read_u24_be(frame: &Frame, offset: usize) -> u32 {
    u32::from_be_bytes([0, frame[offset], frame[offset + 1], frame[offset + 2]])
}

/// 5 bytes big-endian, zero-extended to 64 bits.
fn read_u40_be(frame: &Frame, offset: usize) -> u64 {
    let mut wide = [0u8; 8];
    wide[3..].copy_from_slice(&frame[offset..offset + WATT_SECONDS_WIDTH]);
    u64::from_be_bytes(wide)
}

fn read_timestamp(frame: &Frame, offset: usize) -> Result<DateTime<Utc>, FrameError> {
    let [yy, month, day, hour, minute, second] = [
        frame[offset],
        frame[offset + 1],
        frame[offset + 2],
        frame[offset + 3],
        frame[offset + 4],
        frame[offset + 5],
    ];
    let year = YEAR_BASE + u16::from(yy);

    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|date| {
            date.and_hms_opt(u32::from(hour), u32::from(minute), u32::from(second))
        })
        .map(|naive| naive.and_utc())
        .ok_or(FrameError::InvalidTimestamp { year, month, day, hour, minute, second })
}
