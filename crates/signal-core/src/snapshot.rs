//! Per-lane vehicle count snapshots

use crate::Lane;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

/// Detection class reported by the detection capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectClass {
    Car,
    Motorcycle,
    Bus,
    Truck,
    /// Ambulance, fire truck, police
    Emergency,
    /// Anything the monitor does not count
    Other,
}

impl ObjectClass {
    /// Whether the class contributes to a lane's total count
    pub fn is_counted_vehicle(self) -> bool {
        matches!(
            self,
            ObjectClass::Car | ObjectClass::Motorcycle | ObjectClass::Bus | ObjectClass::Truck
        )
    }
}

/// Immutable summary of a lane's most recent counts
///
/// Published by the lane monitor and replaced wholesale on every update;
/// readers only ever see a complete value.
#[derive(Debug, Clone, PartialEq)]
pub struct LaneSnapshot {
    pub lane: Lane,

    /// Counted vehicles (cars, motorcycles, buses, trucks)
    pub total_count: u32,

    /// Per-class tallies, including emergency vehicles
    pub counts_by_class: BTreeMap<ObjectClass, u32>,

    /// An emergency vehicle was detected above the confidence threshold
    pub emergency_present: bool,

    /// Class-weighted density, for presentation
    pub weighted_density: f32,

    /// When the counts were produced
    pub captured_at: Instant,

    /// No frame was ingested within the freshness window
    pub stale: bool,

    /// Consecutive frames whose detection failed
    pub missed_frames: u32,
}

impl LaneSnapshot {
    /// Empty snapshot published before the first frame
    pub fn empty(lane: Lane, at: Instant) -> Self {
        Self {
            lane,
            total_count: 0,
            counts_by_class: BTreeMap::new(),
            emergency_present: false,
            weighted_density: 0.0,
            captured_at: at,
            stale: false,
            missed_frames: 0,
        }
    }

    /// Snapshot carrying only a total count
    pub fn with_count(lane: Lane, total_count: u32, at: Instant) -> Self {
        let mut snapshot = Self::empty(lane, at);
        snapshot.total_count = total_count;
        snapshot.counts_by_class.insert(ObjectClass::Car, total_count);
        snapshot.weighted_density = total_count as f32;
        snapshot
    }

    /// Builder-style emergency flag
    pub fn with_emergency(mut self, present: bool) -> Self {
        self.emergency_present = present;
        self
    }

    /// Time since the counts were produced (zero if `now` precedes capture)
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.captured_at)
    }

    /// Copy with the stale flag evaluated against a freshness window
    pub fn evaluated(&self, now: Instant, stale_after: Duration) -> Self {
        let mut snapshot = self.clone();
        snapshot.stale = self.stale || self.age(now) > stale_after;
        snapshot
    }

    pub fn count_of(&self, class: ObjectClass) -> u32 {
        self.counts_by_class.get(&class).copied().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counted_classes() {
        assert!(ObjectClass::Bus.is_counted_vehicle());
        assert!(!ObjectClass::Emergency.is_counted_vehicle());
        assert!(!ObjectClass::Other.is_counted_vehicle());
    }

    #[test]
    fn test_staleness_evaluation() {
        let t0 = Instant::now();
        let snapshot = LaneSnapshot::with_count(Lane::East, 4, t0);

        let fresh = snapshot.evaluated(t0 + Duration::from_secs(2), Duration::from_secs(3));
        assert!(!fresh.stale);

        let stale = snapshot.evaluated(t0 + Duration::from_secs(4), Duration::from_secs(3));
        assert!(stale.stale);
        assert_eq!(stale.total_count, 4);
    }

    #[test]
    fn test_age_saturates() {
        let t0 = Instant::now();
        let snapshot = LaneSnapshot::empty(Lane::North, t0 + Duration::from_secs(5));
        assert_eq!(snapshot.age(t0), Duration::ZERO);
    }
}
