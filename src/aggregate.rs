use std::collections::{BTreeMap, HashSet};

use log::debug;

use crate::detection::{TrackId, VehicleClass};

/// Lifetime summary of one tracked vehicle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VehicleRecord {
    /// Class seen on the most recent frame.
    pub vehicle_type: Option<VehicleClass>,
    pub max_speed: u32,
    pub frame_count: u64,
    pub first_seen: Option<u64>,
    pub last_seen: Option<u64>,
}

/// Distinct identities per class, attributed to the class seen first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleCounts(BTreeMap<VehicleClass, u64>);

impl VehicleCounts {
    #[inline]
    pub fn get(&self, class: VehicleClass) -> u64 {
        self.0.get(&class).copied().unwrap_or(0)
    }

    #[inline]
    pub fn total(&self) -> u64 {
        self.0.values().sum()
    }

    /// All classes in display order, zero counts included.
    pub fn iter(&self) -> impl Iterator<Item = (VehicleClass, u64)> + '_ {
        self.0.iter().map(|(class, count)| (*class, *count))
    }

    fn increment(&mut self, class: VehicleClass) {
        *self.0.entry(class).or_insert(0) += 1;
    }
}

impl Default for VehicleCounts {
    fn default() -> Self {
        Self(VehicleClass::ALL.iter().map(|c| (*c, 0)).collect())
    }
}

/// Folds per-frame observations into per-identity records and class counts.
#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    counted: HashSet<TrackId>,
    counts: VehicleCounts,
    records: BTreeMap<TrackId, VehicleRecord>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one sighting of `id` on frame `frame_index`.
    ///
    /// The count goes to the class of the first sighting while the record
    /// keeps the latest class, so a reclassified vehicle can show a type that
    /// differs from the bucket it was counted in.
    pub fn observe(&mut self, id: TrackId, class: VehicleClass, frame_index: u64) {
        if self.counted.insert(id) {
            debug!("new vehicle #{} ({})", id, class);
            self.counts.increment(class);
        }

        let record = self.records.entry(id).or_default();
        record.vehicle_type = Some(class);
        record.frame_count += 1;
        if record.first_seen.is_none() {
            record.first_seen = Some(frame_index);
        }
        record.last_seen = Some(frame_index);
    }

    pub fn observe_speed(&mut self, id: TrackId, speed: u32) {
        let record = self.records.entry(id).or_default();
        record.max_speed = record.max_speed.max(speed);
    }

    #[inline]
    pub fn counts(&self) -> &VehicleCounts {
        &self.counts
    }

    /// Records keyed by identity, ascending.
    #[inline]
    pub fn records(&self) -> &BTreeMap<TrackId, VehicleRecord> {
        &self.records
    }

    #[inline]
    pub fn record(&self, id: TrackId) -> Option<&VehicleRecord> {
        self.records.get(&id)
    }

    pub fn into_parts(self) -> (VehicleCounts, BTreeMap<TrackId, VehicleRecord>) {
        (self.counts, self.records)
    }
}
