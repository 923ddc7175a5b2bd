//! Good/bad frame tallies

/// Running count of decoded and rejected frames.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PacketCounts {
    pub good: u64,
    pub bad: u64,
}

impl PacketCounts {
    pub fn new(good: u64, bad: u64) -> Self {
        Self { good, bad }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        assert_eq!(PacketCounts::default(), PacketCounts::new(0, 0));
    }
}
