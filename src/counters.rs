//! Process-wide packet counters.

use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::PacketCounts;

/// Good/bad frame totals across all connections.
#[derive(Debug, Default)]
pub struct PacketCounters {
    good: AtomicU64,
    bad: AtomicU64,
}

impl PacketCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add increments and return the resulting totals.
    pub fn record(&self, good: u64, bad: u64) -> PacketCounts {
        let totals = PacketCounts::new(
            self.good.fetch_add(good, Ordering::Relaxed) + good,
            self.bad.fetch_add(bad, Ordering::Relaxed) + bad,
        );
        debug!(good = totals.good, bad = totals.bad, "Packet totals");
        totals
    }

    pub fn totals(&self) -> PacketCounts {
        PacketCounts::new(self.good.load(Ordering::Relaxed), self.bad.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn record_returns_running_totals() {
        let counters = PacketCounters::new();
        assert_eq!(counters.record(1, 0), PacketCounts::new(1, 0));
        assert_eq!(counters.record(0, 1), PacketCounts::new(1, 1));
        assert_eq!(counters.record(2, 0), PacketCounts::new(3, 1));
        assert_eq!(counters.totals(), PacketCounts::new(3, 1));
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let counters = Arc::new(PacketCounters::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counters = Arc::clone(&counters);
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        counters.record(1, 0);
                        counters.record(0, 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counters.totals(), PacketCounts::new(4000, 4000));
    }
}
