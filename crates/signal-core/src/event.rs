//! Structured events emitted by monitors and the controller

use crate::{Lane, ObjectClass, PhaseKind, TransitionReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// A lane together with the phase it holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseRef {
    pub lane: Lane,
    pub phase: PhaseKind,
}

/// Intersection-wide alert conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemAlertKind {
    /// Every lane is running on stale counts; timers keep rotating
    AllLanesStale,
    /// No lane is eligible; the current phase is held
    AllLanesOffline,
}

/// Event delivered to an [`EventSink`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Event {
    /// A lane monitor published new counts
    VehicleCount {
        lane: Lane,
        at: DateTime<Utc>,
        total: u32,
        by_class: BTreeMap<ObjectClass, u32>,
        emergency: bool,
    },

    /// The phase state changed
    SignalChange {
        at: DateTime<Utc>,
        /// None at startup
        from: Option<PhaseRef>,
        /// None at shutdown
        to: Option<PhaseRef>,
        /// Time the previous phase was held
        held: Duration,
        reason: TransitionReason,
    },

    /// A lane's emergency flag went up
    EmergencyDetected {
        lane: Lane,
        at: DateTime<Utc>,
        confidence: f32,
    },

    /// A lane's snapshot aged past the degraded or offline threshold
    LaneDegraded {
        lane: Lane,
        at: DateTime<Utc>,
        age: Duration,
        offline: bool,
    },

    /// A degraded or offline lane is publishing fresh counts again
    LaneRecovered { lane: Lane, at: DateTime<Utc> },

    SystemAlert {
        at: DateTime<Utc>,
        alert: SystemAlertKind,
    },
}

impl Event {
    /// Short name used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Event::VehicleCount { .. } => "VEHICLE_COUNT",
            Event::SignalChange { .. } => "SIGNAL_CHANGE",
            Event::EmergencyDetected { .. } => "EMERGENCY_DETECTED",
            Event::LaneDegraded { .. } => "LANE_DEGRADED",
            Event::LaneRecovered { .. } => "LANE_RECOVERED",
            Event::SystemAlert { .. } => "SYSTEM_ALERT",
        }
    }

    /// Lane the event concerns, if any
    pub fn lane(&self) -> Option<Lane> {
        match self {
            Event::VehicleCount { lane, .. }
            | Event::EmergencyDetected { lane, .. }
            | Event::LaneDegraded { lane, .. }
            | Event::LaneRecovered { lane, .. } => Some(*lane),
            Event::SignalChange { to, from, .. } => to.or(*from).map(|p| p.lane),
            Event::SystemAlert { .. } => None,
        }
    }

    pub fn at(&self) -> DateTime<Utc> {
        match self {
            Event::VehicleCount { at, .. }
            | Event::SignalChange { at, .. }
            | Event::EmergencyDetected { at, .. }
            | Event::LaneDegraded { at, .. }
            | Event::LaneRecovered { at, .. }
            | Event::SystemAlert { at, .. } => *at,
        }
    }
}

/// Receiver of structured events
///
/// Delivery is fire-and-forget: `record` must not block and sink failures
/// never reach the caller.
pub trait EventSink: Send + Sync {
    fn record(&self, event: Event);
}

/// Sink that discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn record(&self, _event: Event) {}
}
