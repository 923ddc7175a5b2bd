//! Bin48-Net-Time wire layout.
//!
//! Every frame is exactly [`FRAME_SIZE`] bytes. Offsets below are zero-based
//! byte positions into the frame:
//!
//! ```text
//!   0..3     header                 FE FF 05
//!   3..5     voltage                u16 little-endian, / 10
//!   5..245   absolute watt-seconds  48 x u40 big-endian
//! 245..485   polarized watt-seconds 48 x u40 big-endian
//! 485..487   serial number          u16 little-endian
//! 487        reserved
//! 488        device type            u8
//! 489..585   currents               48 x u16 big-endian, / 50
//! 585..588   elapsed seconds        u24 big-endian
//! 588..600   pulse counters         4 x u24 big-endian
//! 600..616   temperatures           8 x u16 big-endian, / 2
//! 616..622   device timestamp       yy mm dd hh mm ss (year offset from 2000)
//! 622..624   footer                 FF FE
//! 624        checksum               wrapping sum of bytes 0..624
//! ```
//!
//! The layout is hand-counted from the vendor datasheet. The block widths have
//! not been cross-checked against captured device traffic.

/// Total frame length in bytes.
pub const FRAME_SIZE: usize = 625;

/// One complete frame.
pub type Frame = [u8; FRAME_SIZE];

/// Fixed frame start marker.
pub const HEADER: [u8; 3] = [0xFE, 0xFF, 0x05];

/// Fixed frame end marker, immediately before the checksum.
pub const FOOTER: [u8; 2] = [0xFF, 0xFE];

/// Number of current/energy channels.
pub const CHANNEL_COUNT: usize = 48;

/// Number of pulse counter inputs.
pub const PULSE_COUNTER_COUNT: usize = 4;

/// Number of temperature sensor inputs.
pub const TEMPERATURE_COUNT: usize = 8;

/// Width of one watt-second counter.
pub const WATT_SECONDS_WIDTH: usize = 5;

/// Width of elapsed-seconds and pulse counters.
pub const COUNTER24_WIDTH: usize = 3;

pub const HEADER_OFFSET: usize = 0;
pub const VOLTAGE_OFFSET: usize = 3;
pub const ABSOLUTE_WATT_SECONDS_OFFSET: usize = 5;
pub const POLARIZED_WATT_SECONDS_OFFSET: usize =
    ABSOLUTE_WATT_SECONDS_OFFSET + CHANNEL_COUNT * WATT_SECONDS_WIDTH;
pub const SERIAL_NUMBER_OFFSET: usize =
    POLARIZED_WATT_SECONDS_OFFSET + CHANNEL_COUNT * WATT_SECONDS_WIDTH;
pub const RESERVED_OFFSET: usize = SERIAL_NUMBER_OFFSET + 2;
pub const DEVICE_TYPE_OFFSET: usize = RESERVED_OFFSET + 1;
pub const CURRENT_OFFSET: usize = DEVICE_TYPE_OFFSET + 1;
pub const SECONDS_OFFSET: usize = CURRENT_OFFSET + CHANNEL_COUNT * 2;
pub const PULSE_COUNTER_OFFSET: usize = SECONDS_OFFSET + COUNTER24_WIDTH;
pub const TEMPERATURE_OFFSET: usize = PULSE_COUNTER_OFFSET + PULSE_COUNTER_COUNT * COUNTER24_WIDTH;
pub const TIMESTAMP_OFFSET: usize = TEMPERATURE_OFFSET + TEMPERATURE_COUNT * 2;
pub const FOOTER_OFFSET: usize = TIMESTAMP_OFFSET + 6;
pub const CHECKSUM_OFFSET: usize = FOOTER_OFFSET + FOOTER.len();

/// Divisor applied to the raw voltage.
pub const VOLTAGE_SCALE: f64 = 10.0;

/// Divisor applied to each raw current.
pub const CURRENT_SCALE: f64 = 50.0;

/// Divisor applied to each raw temperature.
pub const TEMPERATURE_SCALE: f64 = 2.0;

/// Device clock years are offsets from this year.
pub const YEAR_BASE: u16 = 2000;

/// Watt-second counters wrap at 2^40.
pub const WATT_SECONDS_MODULUS: u64 = 1 << 40;

/// Elapsed-seconds and pulse counters wrap at 2^24.
pub const COUNTER24_MODULUS: u32 = 1 << 24;

/// Unsigned 8-bit wrapping sum of `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |sum, b| sum.wrapping_add(*b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_tile_the_frame() {
        assert_eq!(VOLTAGE_OFFSET, HEADER_OFFSET + HEADER.len());
        assert_eq!(POLARIZED_WATT_SECONDS_OFFSET, 245);
        assert_eq!(SERIAL_NUMBER_OFFSET, 485);
        assert_eq!(DEVICE_TYPE_OFFSET, 488);
        assert_eq!(CURRENT_OFFSET, 489);
        assert_eq!(SECONDS_OFFSET, 585);
        assert_eq!(PULSE_COUNTER_OFFSET, 588);
        assert_eq!(TEMPERATURE_OFFSET, 600);
        assert_eq!(TIMESTAMP_OFFSET, 616);
        assert_eq!(FOOTER_OFFSET, 622);
        assert_eq!(CHECKSUM_OFFSET, 624);
        assert_eq!(CHECKSUM_OFFSET + 1, FRAME_SIZE);
    }

    #[test]
    fn checksum_wraps() {
        assert_eq!(checksum(&[]), 0);
        assert_eq!(checksum(&[0xFF, 0x01]), 0);
        assert_eq!(checksum(&[0xFE, 0xFF, 0x05]), 0x02);
        assert_eq!(checksum(&[0x80; 3]), 0x80);
    }
}
