//! Intersection approaches and rotation order

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

/// One of the four directional approaches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    North,
    East,
    South,
    West,
}

impl Lane {
    /// All lanes in a fixed storage order (not the rotation order)
    pub const ALL: [Lane; 4] = [Lane::North, Lane::East, Lane::South, Lane::West];

    /// Storage slot used by [`LaneMap`]
    pub fn index(self) -> usize {
        match self {
            Lane::North => 0,
            Lane::East => 1,
            Lane::South => 2,
            Lane::West => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Lane::North => "NORTH",
            Lane::East => "EAST",
            Lane::South => "SOUTH",
            Lane::West => "WEST",
        }
    }
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Lane {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "NORTH" | "N" => Ok(Lane::North),
            "EAST" | "E" => Ok(Lane::East),
            "SOUTH" | "S" => Ok(Lane::South),
            "WEST" | "W" => Ok(Lane::West),
            _ => Err(ConfigError::InvalidValue {
                field: "lane",
                value: s.to_string(),
            }),
        }
    }
}

/// Fixed-size per-lane storage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LaneMap<T>([T; 4]);

impl<T> LaneMap<T> {
    pub fn from_fn(mut f: impl FnMut(Lane) -> T) -> Self {
        Self(Lane::ALL.map(&mut f))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Lane, &T)> {
        Lane::ALL.into_iter().zip(self.0.iter())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }

    pub fn map<U>(&self, mut f: impl FnMut(Lane, &T) -> U) -> LaneMap<U> {
        LaneMap::from_fn(|lane| f(lane, &self.0[lane.index()]))
    }
}

impl<T> Index<Lane> for LaneMap<T> {
    type Output = T;

    fn index(&self, lane: Lane) -> &T {
        &self.0[lane.index()]
    }
}

impl<T> IndexMut<Lane> for LaneMap<T> {
    fn index_mut(&mut self, lane: Lane) -> &mut T {
        &mut self.0[lane.index()]
    }
}

/// Ordered, cyclic rotation of the four lanes
///
/// Built once from configuration and never mutated afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SignalSequence {
    order: [Lane; 4],
}

impl Default for SignalSequence {
    /// Clockwise: NORTH -> EAST -> SOUTH -> WEST
    fn default() -> Self {
        Self {
            order: [Lane::North, Lane::East, Lane::South, Lane::West],
        }
    }
}

impl SignalSequence {
    /// Build a sequence, requiring each lane exactly once
    pub fn new(lanes: &[Lane]) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidSequence(lanes.iter().map(|l| l.to_string()).collect());

        if lanes.len() != 4 {
            return Err(invalid());
        }

        let mut seen = [false; 4];
        for lane in lanes {
            if std::mem::replace(&mut seen[lane.index()], true) {
                return Err(invalid());
            }
        }

        Ok(Self {
            order: [lanes[0], lanes[1], lanes[2], lanes[3]],
        })
    }

    /// First lane; GREEN at startup
    pub fn first(&self) -> Lane {
        self.order[0]
    }

    /// Ordinal position of a lane in the rotation
    pub fn position(&self, lane: Lane) -> usize {
        // Construction guarantees every lane is present
        self.order.iter().position(|l| *l == lane).unwrap_or(0)
    }

    /// Cyclic successor
    pub fn successor(&self, lane: Lane) -> Lane {
        self.order[(self.position(lane) + 1) % 4]
    }

    /// Steps forward from `from` to reach `to` (0 when equal)
    pub fn distance(&self, from: Lane, to: Lane) -> usize {
        (self.position(to) + 4 - self.position(from)) % 4
    }

    /// Lanes following `lane`, in rotation order, excluding `lane` itself
    pub fn after(&self, lane: Lane) -> impl Iterator<Item = Lane> + '_ {
        let start = self.position(lane);
        (1..4).map(move |step| self.order[(start + step) % 4])
    }

    pub fn iter(&self) -> impl Iterator<Item = Lane> + '_ {
        self.order.iter().copied()
    }
}
