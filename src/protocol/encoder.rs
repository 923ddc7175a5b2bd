//! Frame encoder
//!
//! Writes a [`Reading`] back into the wire layout. Used by device simulators
//! and to check the decoder against known frames. Scaled values are rounded to
//! the nearest raw unit; anything that does not fit its raw width is an
//! [`GemError::Encode`] error.

use chrono::{Datelike, Timelike};

use super::format::*;
use crate::{GemError, Reading, Result};

/// Encode `reading` as a complete, sealed frame.
pub fn encode(reading: &Reading) -> Result<Frame> {
    let mut frame = [0u8; FRAME_SIZE];

    let voltage = scale_u16("voltage", reading.voltage, VOLTAGE_SCALE)?;
    frame[VOLTAGE_OFFSET..VOLTAGE_OFFSET + 2].copy_from_slice(&voltage.to_le_bytes());

    for (i, value) in reading.absolute_watt_seconds.iter().enumerate() {
        write_u40_be(&mut frame, ABSOLUTE_WATT_SECONDS_OFFSET + i * WATT_SECONDS_WIDTH, *value)?;
    }
    for (i, value) in reading.polarized_watt_seconds.iter().enumerate() {
        write_u40_be(&mut frame, POLARIZED_WATT_SECONDS_OFFSET + i * WATT_SECONDS_WIDTH, *value)?;
    }

    frame[SERIAL_NUMBER_OFFSET..SERIAL_NUMBER_OFFSET + 2]
        .copy_from_slice(&reading.device_id.serial_number.to_le_bytes());
    frame[DEVICE_TYPE_OFFSET] = reading.device_id.device_type;

    for (i, value) in reading.currents.iter().enumerate() {
        let raw = scale_u16("current", *value, CURRENT_SCALE)?;
        let at = CURRENT_OFFSET + i * 2;
        frame[at..at + 2].copy_from_slice(&raw.to_be_bytes());
    }

    write_u24_be(&mut frame, SECONDS_OFFSET, reading.elapsed_seconds, "elapsed seconds")?;
    for (i, value) in reading.pulse_counters.iter().enumerate() {
        let offset = PULSE_COUNTER_OFFSET + i * COUNTER24_WIDTH;
        write_u24_be(&mut frame, offset, *value, "pulse counter")?;
    }

    for (i, value) in reading.temperatures.iter().enumerate() {
        let raw = scale_u16("temperature", *value, TEMPERATURE_SCALE)?;
        let at = TEMPERATURE_OFFSET + i * 2;
        frame[at..at + 2].copy_from_slice(&raw.to_be_bytes());
    }

    let time = reading.device_time;
    let year = u8::try_from(i64::from(time.year()) - i64::from(YEAR_BASE)).map_err(|_| {
        GemError::encode_error("device time", format!("year {} outside 2000..=2255", time.year()))
    })?;
    frame[TIMESTAMP_OFFSET..TIMESTAMP_OFFSET + 6].copy_from_slice(&[
        year,
        time.month() as u8,
        time.day() as u8,
        time.hour() as u8,
        time.minute() as u8,
        time.second() as u8,
    ]);

    seal(&mut frame);
    Ok(frame)
}

/// Write header, footer and checksum over the current frame contents.
pub fn seal(frame: &mut Frame) {
    frame[HEADER_OFFSET..HEADER_OFFSET + HEADER.len()].copy_from_slice(&HEADER);
    frame[FOOTER_OFFSET..FOOTER_OFFSET + FOOTER.len()].copy_from_slice(&FOOTER);
    frame[CHECKSUM_OFFSET] = checksum(&frame[..CHECKSUM_OFFSET]);
}

fn scale_u16(field: &str, value: f64, scale: f64) -> Result<u16> {
    let raw = (value * scale).round();
    if !raw.is_finite() || raw < 0.0 || raw > f64::from(u16::MAX) {
        return Err(GemError::encode_error(field, format!("{} does not fit 16 bits", value)));
    }
    Ok(raw as u16)
}

fn write_u24_be(frame: &mut Frame, offset: usize, value: u32, field: &str) -> Result<()> {
    if value >= COUNTER24_MODULUS {
        return Err(GemError::encode_error(field, format!("{} does not fit 24 bits", value)));
    }
    frame[offset..offset + COUNTER24_WIDTH].copy_from_slice(&value.to_be_bytes()[1..]);
    Ok(())
}

fn write_u40_be(frame: &mut Frame, offset: usize, value: u64) -> Result<()> {
    if value >= WATT_SECONDS_MODULUS {
        return Err(GemError::encode_error(
            "watt-seconds",
            format!("{} does not fit 40 bits", value),
        ));
    }
    frame[offset..offset + WATT_SECONDS_WIDTH].copy_from_slice(&value.to_be_bytes()[3..]);
    Ok(())
}
