//! Aggregate store of the latest reading per device.

use dashmap::DashMap;
use std::sync::Arc;

use crate::{DeviceId, Reading};

/// Latest [`Reading`] per [`DeviceId`], last write wins.
///
/// Readings are immutable once stored, so handing out `Arc` clones gives
/// every consumer an independent snapshot.
#[derive(Debug, Default)]
pub struct ReadingStore {
    readings: DashMap<DeviceId, Arc<Reading>>,
}

impl ReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `reading` and return the one it replaced, if any.
    pub fn insert(&self, reading: Arc<Reading>) -> Option<Arc<Reading>> {
        self.readings.insert(reading.device_id, reading)
    }

    pub fn get(&self, device_id: &DeviceId) -> Option<Arc<Reading>> {
        self.readings.get(device_id).map(|entry| Arc::clone(entry.value()))
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Known devices in ascending order.
    pub fn devices(&self) -> Vec<DeviceId> {
        let mut devices: Vec<DeviceId> = self.readings.iter().map(|entry| *entry.key()).collect();
        devices.sort();
        devices
    }

    /// Snapshot of every stored reading.
    pub fn snapshot(&self) -> Vec<Arc<Reading>> {
        self.readings.iter().map(|entry| Arc::clone(entry.value())).collect()
    }
}
