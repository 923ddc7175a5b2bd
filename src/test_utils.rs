//! Shared fixtures for unit tests.

use chrono::{TimeZone, Utc};

use crate::protocol::format::{CHANNEL_COUNT, Frame};
use crate::protocol::encode;
use crate::{DeviceId, Reading};

/// A reading with distinct, exactly representable values in every block.
pub fn sample_reading() -> Reading {
    Reading {
        device_id: DeviceId::new(5, 66),
        voltage: 121.3,
        absolute_watt_seconds: std::array::from_fn(|i| 1_000_000 + i as u64 * 7_919),
        polarized_watt_seconds: std::array::from_fn(|i| 500_000 + i as u64 * 104_729),
        currents: std::array::from_fn(|i| i as f64 * 0.5),
        pulse_counters: [10, 20, 30, 16_777_215],
        temperatures: [20.0, 20.5, 21.0, 21.5, 22.0, 22.5, 23.0, 23.5],
        elapsed_seconds: 123_456,
        device_time: Utc.with_ymd_and_hms(2020, 6, 15, 12, 30, 45).unwrap(),
    }
}

/// [`sample_reading`] encoded as a valid frame.
pub fn sample_frame() -> Frame {
    encode(&sample_reading()).expect("sample reading fits the wire format")
}

/// A frame for a different device, to tell frames apart in driver tests.
pub fn frame_for(device_type: u8, serial_number: u16) -> Frame {
    let mut reading = sample_reading();
    reading.device_id = DeviceId::new(device_type, serial_number);
    reading.currents = [0.0; CHANNEL_COUNT];
    encode(&reading).expect("fixture reading fits the wire format")
}
