//! Decoded telemetry sample

use chrono::{DateTime, Utc};
use std::fmt;

use crate::protocol::format::{CHANNEL_COUNT, PULSE_COUNTER_COUNT, TEMPERATURE_COUNT};

/// Stable identity of a monitor: device type code plus serial number.
///
/// Formats as two zero-padded digits of type followed by five of serial,
/// e.g. type `5` with serial `66` is `"0500066"`. This string is the join key
/// across frames and reconnects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId {
    pub device_type: u8,
    pub serial_number: u16,
}

impl DeviceId {
    pub fn new(device_type: u8, serial_number: u16) -> Self {
        Self { device_type, serial_number }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}{:05}", self.device_type, self.serial_number)
    }
}

/// One fully validated telemetry sample.
///
/// Only produced from a frame that passed header, footer and checksum
/// validation. Readings own all their data, so a buffer reused for the next
/// frame can never alias one.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub device_id: DeviceId,
    /// Line voltage in volts, 0.1 V resolution.
    pub voltage: f64,
    /// Cumulative absolute energy per channel, wraps at 2^40.
    pub absolute_watt_seconds: [u64; CHANNEL_COUNT],
    /// Cumulative polarized energy per channel, wraps at 2^40.
    pub polarized_watt_seconds: [u64; CHANNEL_COUNT],
    /// Instantaneous current per channel in amps, 0.02 A resolution.
    pub currents: [f64; CHANNEL_COUNT],
    /// Cumulative pulse counts, wrap at 2^24.
    pub pulse_counters: [u32; PULSE_COUNTER_COUNT],
    /// Temperatures in degrees Celsius, 0.5 degree resolution.
    pub temperatures: [f64; TEMPERATURE_COUNT],
    /// Device uptime counter, wraps at 2^24.
    pub elapsed_seconds: u32,
    /// Device clock, assumed UTC.
    pub device_time: DateTime<Utc>,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Serial Number : {}", self.device_id)?;
        writeln!(f, "Voltage : {}", self.voltage)?;
        writeln!(f, "Seconds : {}", self.elapsed_seconds)?;
        writeln!(f, "TimeStamp : {}", self.device_time.format("%Y-%m-%dT%H:%M:%S"))?;
        writeln!(f, "Temperature : {}", join(&self.temperatures))?;
        writeln!(f, "Pulse Counter : {}", join(&self.pulse_counters))?;
        writeln!(f, "Current : {}", join(&self.currents))?;
        writeln!(f, "Abs W/s : {}", join(&self.absolute_watt_seconds))?;
        write!(f, "Pol W/s : {}", join(&self.polarized_watt_seconds))
    }
}

fn join<T: fmt::Display>(values: &[T]) -> String {
    values.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(", ")
}
